// ── Core error types ──
//
// User-facing errors from wnetctl-core. SSH failures are classified per
// access point into transport, protocol and remote-command errors; the
// raw `wnetctl_ssh::Error` stays available as the source.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request errors ───────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error("{entity_type} already exists: {identifier}")]
    AlreadyExists {
        entity_type: &'static str,
        identifier: String,
    },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Cannot reach access point {ap}: {source}")]
    Transport {
        ap: String,
        #[source]
        source: wnetctl_ssh::Error,
    },

    #[error("Unexpected response from access point {ap}: {source}")]
    ProtocolMismatch {
        ap: String,
        #[source]
        source: wnetctl_ssh::Error,
    },

    #[error("Command failed on access point {ap}: {message}")]
    RemoteCommand { ap: String, message: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error("Site saved in memory but not on disk: {0}")]
    Persistence(#[source] StoreError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Classify an SSH failure on access point `ap`.
    pub fn remote(ap: &str, err: wnetctl_ssh::Error) -> Self {
        let ap = ap.to_owned();
        if err.is_transport() {
            Self::Transport { ap, source: err }
        } else if err.is_protocol_mismatch() {
            Self::ProtocolMismatch { ap, source: err }
        } else {
            Self::RemoteCommand {
                ap,
                message: describe_remote(&err),
            }
        }
    }

    /// Returns `true` when a remote call ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                source: wnetctl_ssh::Error::Timeout { .. },
                ..
            }
        )
    }

    /// Name of the access point a remote failure happened on.
    pub fn access_point(&self) -> Option<&str> {
        match self {
            Self::Transport { ap, .. }
            | Self::ProtocolMismatch { ap, .. }
            | Self::RemoteCommand { ap, .. } => Some(ap),
            _ => None,
        }
    }
}

fn describe_remote(err: &wnetctl_ssh::Error) -> String {
    match err {
        wnetctl_ssh::Error::Execution {
            command,
            exit_code,
            stderr,
        } if !stderr.trim().is_empty() => {
            format!("\"{command}\" exited with {exit_code}: {}", stderr.trim())
        }
        other => other.to_string(),
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid { path, message } => Self::Validation {
                message: format!("{}: {message}", path.display()),
            },
            other => Self::Persistence(other),
        }
    }
}

// ── Compensation warnings ────────────────────────────────────────────

/// A remote step that could not be undone, or a best-effort step that
/// failed. The device named by `ap` may now disagree with the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationWarning {
    pub operation: &'static str,
    pub ap: String,
    pub reason: String,
}

impl fmt::Display for CompensationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} left {} inconsistent: {}", self.operation, self.ap, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_classified_as_transport() {
        let err = CoreError::remote(
            "hall",
            wnetctl_ssh::Error::Timeout {
                address: "10.0.0.2:22".into(),
                timeout_secs: 5,
            },
        );
        assert!(err.is_timeout());
        assert_eq!(err.access_point(), Some("hall"));
    }

    #[test]
    fn prompt_mismatch_is_protocol_error() {
        let err = CoreError::remote(
            "hall",
            wnetctl_ssh::Error::ProtocolMismatch {
                command: "passwd root".into(),
                expected: "New password:".into(),
                received: "Old password:".into(),
            },
        );
        assert!(matches!(err, CoreError::ProtocolMismatch { .. }));
    }

    #[test]
    fn execution_failure_is_remote_command() {
        let err = CoreError::remote(
            "hall",
            wnetctl_ssh::Error::Execution {
                command: "tee -a /etc/dropbear/authorized_keys".into(),
                exit_code: 1,
                stderr: "read-only file system\n".into(),
            },
        );
        match err {
            CoreError::RemoteCommand { message, .. } => {
                assert!(message.ends_with("exited with 1: read-only file system"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
