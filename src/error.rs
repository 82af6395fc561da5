//! Link error taxonomy.
//!
//! Every variant is recoverable: open failures end that call, read/write failures are
//! reported while the link stays up. The `Display` text is what the error observer sees.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Serial port not found: {path}")]
    NotFound { path: String },

    #[error("Serial port permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Failed to open port {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Serial port is not open")]
    NotOpen,

    #[error("Read error: {0}")]
    Read(#[source] std::io::Error),

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Write failed: short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    #[error("Failed to start serial poller: {0}")]
    Spawn(#[source] std::io::Error),
}

impl LinkError {
    /// True for failures of `open` (the link never reached the Open state).
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            LinkError::NotFound { .. }
                | LinkError::PermissionDenied { .. }
                | LinkError::Open { .. }
                | LinkError::Spawn(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        let e = LinkError::NotFound {
            path: "/dev/ttyUSB9".into(),
        };
        assert_eq!(e.to_string(), "Serial port not found: /dev/ttyUSB9");
        let e = LinkError::ShortWrite {
            written: 3,
            expected: 14,
        };
        assert!(e.to_string().contains("3 of 14"));
    }

    #[test]
    fn classifies_open_failures() {
        assert!(LinkError::PermissionDenied { path: "x".into() }.is_open_failure());
        assert!(!LinkError::NotOpen.is_open_failure());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "EIO");
        assert!(!LinkError::Read(io).is_open_failure());
    }
}
