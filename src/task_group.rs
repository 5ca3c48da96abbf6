//! Group of local tasks with cancellation.
use std::{cell::Cell, cell::RefCell, fmt, future::poll_fn, future::Future, pin::Pin, rc::Rc};
use std::task::{Context, Poll, Waker};

use fxhash::FxHashMap;
use ntex_util::task::LocalWaker;

#[derive(Default)]
struct Signal {
    cancelled: Cell<bool>,
    waker: LocalWaker,
}

impl Signal {
    fn cancel(&self) {
        if !self.cancelled.replace(true) {
            self.waker.wake();
        }
    }
}

pin_project_lite::pin_project! {
    /// Future that completes with `None` once its task is cancelled.
    ///
    /// The inner future is dropped together with the wrapper.
    pub struct Cancellable<F> {
        #[pin]
        fut: F,
        signal: Rc<Signal>,
    }
}

impl<F: Future> Future for Cancellable<F> {
    type Output = Option<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if this.signal.cancelled.get() {
            return Poll::Ready(None);
        }
        if let Poll::Ready(res) = this.fut.poll(cx) {
            return Poll::Ready(Some(res));
        }
        this.signal.waker.register(cx.waker());
        Poll::Pending
    }
}

/// Handle of a task spawned with [`TaskGroup::spawn_cancellable`]
pub struct CancellableTaskHandle {
    signal: Rc<Signal>,
}

impl CancellableTaskHandle {
    /// Cancel the task, siblings are not affected
    pub fn cancel(&self) {
        self.signal.cancel();
    }
}

impl fmt::Debug for CancellableTaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableTaskHandle")
            .field("cancelled", &self.signal.cancelled.get())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    next_id: Cell<usize>,
    cancelled: Cell<bool>,
    tasks: RefCell<FxHashMap<usize, Rc<Signal>>>,
    waiters: RefCell<Vec<Waker>>,
}

/// Group of local tasks.
///
/// Tasks run on the current thread's runtime. Cancelling the group
/// cancels every running task, tasks spawned afterwards are cancelled
/// immediately.
#[derive(Clone, Default)]
pub struct TaskGroup(Rc<Inner>);

struct TaskGuard {
    group: Rc<Inner>,
    id: usize,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let empty = {
            let mut tasks = self.group.tasks.borrow_mut();
            tasks.remove(&self.id);
            tasks.is_empty()
        };
        if empty {
            let waiters = std::mem::take(&mut *self.group.waiters.borrow_mut());
            for waker in waiters {
                waker.wake();
            }
        }
    }
}

impl TaskGroup {
    pub fn new() -> Self {
        TaskGroup::default()
    }

    /// Spawn task
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.spawn_inner(fut);
    }

    /// Spawn task that can be cancelled individually
    pub fn spawn_cancellable<F>(&self, fut: F) -> CancellableTaskHandle
    where
        F: Future<Output = ()> + 'static,
    {
        CancellableTaskHandle {
            signal: self.spawn_inner(fut),
        }
    }

    fn spawn_inner<F>(&self, fut: F) -> Rc<Signal>
    where
        F: Future<Output = ()> + 'static,
    {
        let signal = Rc::new(Signal::default());
        if self.0.cancelled.get() {
            signal.cancelled.set(true);
        }

        let id = self.0.next_id.get();
        self.0.next_id.set(id.wrapping_add(1));
        self.0.tasks.borrow_mut().insert(id, signal.clone());

        let guard = TaskGuard {
            id,
            group: self.0.clone(),
        };
        let task = Cancellable {
            fut,
            signal: signal.clone(),
        };
        let _ = ntex_rt::spawn(async move {
            if task.await.is_none() {
                log::trace!("task {} is cancelled", guard.id);
            }
            drop(guard);
        });
        signal
    }

    /// Cancel all tasks
    pub fn cancel_all(&self) {
        self.0.cancelled.set(true);
        let tasks: Vec<_> = self.0.tasks.borrow().values().cloned().collect();
        log::debug!("cancelling {} tasks", tasks.len());
        for signal in tasks {
            signal.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.get()
    }

    /// Number of running tasks
    pub fn active(&self) -> usize {
        self.0.tasks.borrow().len()
    }

    /// Wait until all tasks complete
    ///
    /// Any number of tasks may wait at the same time.
    pub async fn wait(&self) {
        poll_fn(|cx| {
            if self.0.tasks.borrow().is_empty() {
                Poll::Ready(())
            } else {
                let mut waiters = self.0.waiters.borrow_mut();
                if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
                    waiters.push(cx.waker().clone());
                }
                Poll::Pending
            }
        })
        .await
    }
}

impl fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup")
            .field("active", &self.active())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
