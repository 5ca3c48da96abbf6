use std::time::Instant;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Connection timer kinds
pub enum Timer {
    Idle = 0,
    MaxAge = 1,
    Grace = 2,
    Keepalive = 3,
    KeepaliveTimeout = 4,
}

const ALL: [Timer; 5] = [
    Timer::Idle,
    Timer::MaxAge,
    Timer::Grace,
    Timer::Keepalive,
    Timer::KeepaliveTimeout,
];

#[derive(Debug, Default)]
/// Deadlines of armed timers
pub(crate) struct Timers {
    deadlines: [Option<Instant>; 5],
}

impl Timers {
    pub(crate) fn arm(&mut self, timer: Timer, at: Instant) {
        log::trace!("arm {:?} timer", timer);
        self.deadlines[timer as usize] = Some(at);
    }

    pub(crate) fn cancel(&mut self, timer: Timer) {
        self.deadlines[timer as usize] = None;
    }

    pub(crate) fn cancel_all(&mut self) {
        self.deadlines = [None; 5];
    }

    pub(crate) fn deadline(&self, timer: Timer) -> Option<Instant> {
        self.deadlines[timer as usize]
    }

    pub(crate) fn is_armed(&self, timer: Timer) -> bool {
        self.deadlines[timer as usize].is_some()
    }

    /// Earliest deadline
    pub(crate) fn next(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// Pop earliest expired timer
    pub(crate) fn expired(&mut self, now: Instant) -> Option<Timer> {
        let timer = ALL
            .iter()
            .filter_map(|t| self.deadline(*t).map(|at| (at, *t)))
            .filter(|(at, _)| *at <= now)
            .min_by_key(|(at, _)| *at)
            .map(|(_, t)| t)?;
        self.cancel(timer);
        Some(timer)
    }
}
