use std::task::{Context, Poll, Waker};
use std::{cell::RefCell, fmt, future::Future, pin::Pin, rc::Rc};

use ntex_bytes::{Bytes, BytesMut};
use ntex_http::HeaderMap;

use crate::codec::{
    Algorithm, Algorithms, Completion, Compressor, Decompressor, MessageDecoder, MessageFramer,
    ACCEPT_ENCODING_HEADER, ENCODING_HEADER,
};
use crate::connection::ConnectionHandle;
use crate::error::RpcError;
use crate::frame::StreamId;

/// Receives stream open/close notifications
pub trait StreamObserver {
    fn stream_opened(&self, id: StreamId);

    fn stream_closed(&self, id: StreamId);
}

impl StreamObserver for ConnectionHandle {
    fn stream_opened(&self, id: StreamId) {
        ConnectionHandle::stream_opened(self, id)
    }

    fn stream_closed(&self, id: StreamId) {
        ConnectionHandle::stream_closed(self, id)
    }
}

/// Rpc method, parsed from `/<service>/<method>` path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    service: String,
    method: String,
}

impl MethodDescriptor {
    pub fn new<S: Into<String>, M: Into<String>>(service: S, method: M) -> Self {
        MethodDescriptor {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Parse request path
    pub fn from_path(path: &str) -> Option<Self> {
        let mut parts = path.strip_prefix('/')?.split('/');
        let service = parts.next()?;
        let method = parts.next()?;

        if service.is_empty() || method.is_empty() || parts.next().is_some() {
            None
        } else {
            Some(MethodDescriptor::new(service, method))
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn full_path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.service, self.method)
    }
}

#[derive(Default)]
struct DescriptorCell {
    result: RefCell<Option<Result<MethodDescriptor, RpcError>>>,
    wakers: RefCell<Vec<Waker>>,
}

impl DescriptorCell {
    fn is_resolved(&self) -> bool {
        self.result.borrow().is_some()
    }

    fn resolve(&self, result: Result<MethodDescriptor, RpcError>) {
        if self.is_resolved() {
            return;
        }
        *self.result.borrow_mut() = Some(result);
        for waker in self.wakers.borrow_mut().drain(..) {
            waker.wake();
        }
    }
}

/// Resolves once request metadata is received.
///
/// Clones resolve to the same result.
#[derive(Clone)]
pub struct MethodDescriptorFuture(Rc<DescriptorCell>);

impl MethodDescriptorFuture {
    /// Resolved descriptor, if available
    pub fn get(&self) -> Option<Result<MethodDescriptor, RpcError>> {
        self.0.result.borrow().clone()
    }
}

impl Future for MethodDescriptorFuture {
    type Output = Result<MethodDescriptor, RpcError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(ref res) = *self.0.result.borrow() {
            return Poll::Ready(res.clone());
        }

        let mut wakers = self.0.wakers.borrow_mut();
        if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
            wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl fmt::Debug for MethodDescriptorFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptorFuture")
            .field("result", &self.0.result.borrow())
            .finish()
    }
}

/// Stream configuration
#[derive(Debug, Copy, Clone)]
pub struct StreamConfig {
    pub compression: Algorithms,
    pub max_payload_size: usize,
}

/// Per-stream glue between connection and message codec
pub struct StreamHandler {
    id: StreamId,
    cfg: StreamConfig,
    observer: Rc<dyn StreamObserver>,
    descriptor: Rc<DescriptorCell>,
    opened: bool,
    closed: bool,
    decoder: MessageDecoder,
    framer: MessageFramer,
    compressor: Option<Compressor>,
    decompressor: Option<Decompressor>,
}

impl StreamHandler {
    /// Server stream, method is resolved from request metadata
    pub fn new(id: StreamId, cfg: StreamConfig, observer: Rc<dyn StreamObserver>) -> Self {
        StreamHandler {
            id,
            cfg,
            observer,
            descriptor: Rc::new(DescriptorCell::default()),
            opened: false,
            closed: false,
            decoder: MessageDecoder::new(cfg.max_payload_size),
            framer: MessageFramer::new(),
            compressor: None,
            decompressor: None,
        }
    }

    /// Client stream for known method
    pub fn with_method(
        id: StreamId,
        descriptor: MethodDescriptor,
        cfg: StreamConfig,
        observer: Rc<dyn StreamObserver>,
    ) -> Self {
        let mut stream = StreamHandler::new(id, cfg, observer);
        stream.open(descriptor);
        stream
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.opened && !self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Method descriptor future
    pub fn method_descriptor(&self) -> MethodDescriptorFuture {
        MethodDescriptorFuture(self.descriptor.clone())
    }

    fn open(&mut self, descriptor: MethodDescriptor) {
        log::trace!("stream {:?} is opened for {}", self.id, descriptor);
        self.descriptor.resolve(Ok(descriptor));
        self.opened = true;
        self.observer.stream_opened(self.id);
    }

    /// Handle request metadata
    pub fn recv_request_metadata(
        &mut self,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<(), RpcError> {
        if self.closed || self.descriptor.is_resolved() {
            return Err(RpcError::internal("Unexpected request metadata"));
        }

        let descriptor = match MethodDescriptor::from_path(path) {
            Some(descriptor) => descriptor,
            None => {
                let err = RpcError::unimplemented(format!("Invalid path: {:?}", path));
                self.descriptor.resolve(Err(err.clone()));
                return Err(err);
            }
        };
        self.open(descriptor);

        self.negotiate_decompressor(headers)?;
        if let Some(accept) = header(headers, ACCEPT_ENCODING_HEADER) {
            if let Some(alg) = self.cfg.compression.select(accept) {
                let mut compressor = Compressor::new(alg);
                compressor.start();
                self.compressor = Some(compressor);
            }
        }
        Ok(())
    }

    /// Handle response metadata
    pub fn recv_response_metadata(&mut self, headers: &HeaderMap) -> Result<(), RpcError> {
        self.negotiate_decompressor(headers)
    }

    /// Use compression for outbound messages
    pub fn set_compression(&mut self, alg: Algorithm) -> Result<(), RpcError> {
        if !self.cfg.compression.supports(alg) {
            return Err(RpcError::internal(format!(
                "{} compression is not enabled",
                alg.name()
            )));
        }
        let mut compressor = Compressor::new(alg);
        compressor.start();
        self.compressor = Some(compressor);
        Ok(())
    }

    fn negotiate_decompressor(&mut self, headers: &HeaderMap) -> Result<(), RpcError> {
        let encoding = match header(headers, ENCODING_HEADER) {
            Some(encoding) if encoding != "identity" => encoding,
            _ => return Ok(()),
        };

        match Algorithm::from_name(encoding) {
            Some(alg) if self.cfg.compression.supports(alg) => {
                let mut decompressor = Decompressor::new(alg);
                decompressor.start();
                self.decompressor = Some(decompressor);
                Ok(())
            }
            _ => {
                let supported = self
                    .cfg
                    .compression
                    .accept_encoding()
                    .unwrap_or_else(|| "identity".to_string());
                Err(RpcError::unimplemented(format!(
                    "{} compression is not supported, supported algorithms are: {}",
                    encoding, supported
                )))
            }
        }
    }

    /// Negotiated outbound compression
    pub fn response_encoding(&self) -> Option<Algorithm> {
        self.compressor.as_ref().map(|c| c.algorithm())
    }

    /// Negotiated inbound compression
    pub fn request_encoding(&self) -> Option<Algorithm> {
        self.decompressor.as_ref().map(|c| c.algorithm())
    }

    /// Decode next message from received data
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, RpcError> {
        self.decoder.decode(src, self.decompressor.as_mut())
    }

    /// Queue message for sending
    pub fn write(&mut self, payload: Bytes, completion: Option<Completion>) {
        self.framer.append(payload, completion)
    }

    /// Frame queued messages into `dst`
    pub fn flush(&mut self, dst: &mut BytesMut) -> Vec<Completion> {
        self.framer.flush(self.compressor.as_mut(), dst)
    }

    /// Close stream
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.descriptor.resolve(Err(RpcError::unavailable(
            "Stream closed before request metadata was received",
        )));

        if let Some(ref mut c) = self.compressor {
            c.end();
        }
        if let Some(ref mut d) = self.decompressor {
            d.end();
        }
        if self.opened {
            log::trace!("stream {:?} is closed", self.id);
            self.observer.stream_closed(self.id);
        }
    }
}

impl Drop for StreamHandler {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StreamHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandler")
            .field("id", &self.id)
            .field("opened", &self.opened)
            .field("closed", &self.closed)
            .field("compressor", &self.compressor)
            .field("decompressor", &self.decompressor)
            .finish()
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
