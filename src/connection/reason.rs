use std::fmt;

use crate::error::ConnectionError;
use crate::frame::Reason;

/// Why a connection was closed
#[derive(Debug, Clone)]
pub enum CloseReason {
    /// No open streams for the configured idle time
    IdleTimeout,
    /// Keepalive ping was not acknowledged in time
    KeepaliveTimeout,
    /// Closed by the local application
    InitiatedLocally,
    /// Closed by the peer
    RemoteInitiated,
    /// Connection failed, `cause` is not set for max-age shutdowns
    Error {
        cause: Option<ConnectionError>,
        active_streams: usize,
    },
    /// Peer sent GOAWAY
    GoAway { code: Reason, message: String },
    /// Connection closed without a local request
    Unexpected {
        error: Option<ConnectionError>,
        was_idle: bool,
    },
}

fn same_error(a: &Option<ConnectionError>, b: &Option<ConnectionError>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_kind(b),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for CloseReason {
    fn eq(&self, other: &CloseReason) -> bool {
        use self::CloseReason::*;

        match (self, other) {
            (IdleTimeout, IdleTimeout)
            | (KeepaliveTimeout, KeepaliveTimeout)
            | (InitiatedLocally, InitiatedLocally)
            | (RemoteInitiated, RemoteInitiated) => true,
            (
                Error {
                    cause: c1,
                    active_streams: s1,
                },
                Error {
                    cause: c2,
                    active_streams: s2,
                },
            ) => s1 == s2 && same_error(c1, c2),
            (
                GoAway {
                    code: c1,
                    message: m1,
                },
                GoAway {
                    code: c2,
                    message: m2,
                },
            ) => c1 == c2 && m1 == m2,
            (
                Unexpected {
                    error: e1,
                    was_idle: i1,
                },
                Unexpected {
                    error: e2,
                    was_idle: i2,
                },
            ) => i1 == i2 && same_error(e1, e2),
            _ => false,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::IdleTimeout => f.write_str("idle timeout"),
            CloseReason::KeepaliveTimeout => f.write_str("keepalive timeout"),
            CloseReason::InitiatedLocally => f.write_str("initiated locally"),
            CloseReason::RemoteInitiated => f.write_str("remote initiated"),
            CloseReason::Error {
                cause: Some(err),
                active_streams,
            } => write!(f, "error: {} (active streams: {})", err, active_streams),
            CloseReason::Error {
                cause: None,
                active_streams,
            } => write!(f, "max age reached (active streams: {})", active_streams),
            CloseReason::GoAway { code, message } => write!(f, "go away: {:?} {:?}", code, message),
            CloseReason::Unexpected { error, was_idle } => match error {
                Some(err) => write!(f, "unexpected: {} (idle: {})", err, was_idle),
                None => write!(f, "unexpected close (idle: {})", was_idle),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn loose_equality() {
        let r1 = CloseReason::Unexpected {
            error: Some(io::Error::new(io::ErrorKind::BrokenPipe, "a").into()),
            was_idle: true,
        };
        let r2 = CloseReason::Unexpected {
            error: Some(io::Error::new(io::ErrorKind::BrokenPipe, "b").into()),
            was_idle: true,
        };
        assert_eq!(r1, r2);
        assert_ne!(
            r1,
            CloseReason::Unexpected {
                error: None,
                was_idle: true
            }
        );
        assert_ne!(CloseReason::IdleTimeout, CloseReason::KeepaliveTimeout);
        assert_eq!(
            CloseReason::Error {
                cause: None,
                active_streams: 1
            }
            .to_string(),
            "max age reached (active streams: 1)"
        );
    }
}
