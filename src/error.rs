use std::{fmt, io, rc::Rc};

use crate::frame::{FrameError, GoAway, Reason};

/// Status code carried by an [`RpcError`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Code {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// Numeric status value as sent on the wire
    pub fn as_u8(self) -> u8 {
        match self {
            Code::Cancelled => 1,
            Code::Unknown => 2,
            Code::InvalidArgument => 3,
            Code::DeadlineExceeded => 4,
            Code::NotFound => 5,
            Code::AlreadyExists => 6,
            Code::PermissionDenied => 7,
            Code::ResourceExhausted => 8,
            Code::FailedPrecondition => 9,
            Code::Aborted => 10,
            Code::OutOfRange => 11,
            Code::Unimplemented => 12,
            Code::Internal => 13,
            Code::Unavailable => 14,
            Code::DataLoss => 15,
            Code::Unauthenticated => 16,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid argument",
            Code::DeadlineExceeded => "deadline exceeded",
            Code::NotFound => "not found",
            Code::AlreadyExists => "already exists",
            Code::PermissionDenied => "permission denied",
            Code::ResourceExhausted => "resource exhausted",
            Code::FailedPrecondition => "failed precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out of range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal error",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data loss",
            Code::Unauthenticated => "unauthenticated",
        };
        f.write_str(name)
    }
}

/// Per-message or per-stream failure
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RpcError {
    pub code: Code,
    pub message: String,
}

impl RpcError {
    pub fn new<T: Into<String>>(code: Code, message: T) -> Self {
        RpcError {
            code,
            message: message.into(),
        }
    }

    pub fn resource_exhausted<T: Into<String>>(message: T) -> Self {
        RpcError::new(Code::ResourceExhausted, message)
    }

    pub fn internal<T: Into<String>>(message: T) -> Self {
        RpcError::new(Code::Internal, message)
    }

    pub fn unimplemented<T: Into<String>>(message: T) -> Self {
        RpcError::new(Code::Unimplemented, message)
    }

    pub fn unavailable<T: Into<String>>(message: T) -> Self {
        RpcError::new(Code::Unavailable, message)
    }
}

/// Connection-fatal errors
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("Io error: {0}")]
    Io(Rc<io::Error>),
    #[error("Protocol error: {0}")]
    Protocol(#[from] FrameError),
    /// Peer keeps pinging without activity
    #[error("Too many pings")]
    TooManyPings,
}

impl ConnectionError {
    /// Loose equality, io errors compare by kind
    pub fn same_kind(&self, other: &ConnectionError) -> bool {
        match (self, other) {
            (ConnectionError::Io(a), ConnectionError::Io(b)) => a.kind() == b.kind(),
            (ConnectionError::Protocol(a), ConnectionError::Protocol(b)) => a == b,
            (ConnectionError::TooManyPings, ConnectionError::TooManyPings) => true,
            _ => false,
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        ConnectionError::Io(Rc::new(err))
    }
}

impl From<&ConnectionError> for GoAway {
    fn from(err: &ConnectionError) -> GoAway {
        match err {
            ConnectionError::Protocol(e) => {
                GoAway::new(Reason::PROTOCOL_ERROR).set_data(format!("protocol error: {:?}", e))
            }
            ConnectionError::TooManyPings => {
                GoAway::new(Reason::ENHANCE_YOUR_CALM).set_data("too_many_pings")
            }
            ConnectionError::Io(_) => {
                GoAway::new(Reason::INTERNAL_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_display() {
        let err = RpcError::resource_exhausted("Message is too large to decompress.");
        assert_eq!(
            err.to_string(),
            "resource exhausted: Message is too large to decompress."
        );
        assert_eq!(err.code.as_u8(), 8);
    }

    #[test]
    fn connection_error_kind() {
        let a = ConnectionError::from(io::Error::new(io::ErrorKind::Other, "a"));
        let b = ConnectionError::from(io::Error::new(io::ErrorKind::Other, "b"));
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&ConnectionError::TooManyPings));

        let g = GoAway::from(&ConnectionError::TooManyPings);
        assert_eq!(g.reason(), Reason::ENHANCE_YOUR_CALM);
        assert_eq!(g.data().as_ref(), b"too_many_pings");
    }
}
