use thiserror::Error;

/// Top-level error type for the `wnetctl-ssh` crate.
///
/// Covers every failure mode of a remote session: connecting, host key
/// verification, authentication, command execution and scripted
/// exchanges. `wnetctl-core` classifies these into transport, protocol and
/// remote-command failures.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect or SSH handshake failed.
    #[error("Cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// The server presented a host key the policy does not accept.
    #[error("Host key for {address} rejected (presented {fingerprint})")]
    HostKeyRejected {
        address: String,
        fingerprint: String,
    },

    /// Connect or command exceeded its time budget. The session is dropped.
    #[error("Operation on {address} timed out after {timeout_secs}s")]
    Timeout { address: String, timeout_secs: u64 },

    /// Session-level failure after the connection was established.
    #[error("SSH transport error: {0}")]
    Transport(String),

    // ── Authentication ──────────────────────────────────────────────
    /// The server refused the offered credentials.
    #[error("Authentication as {user} by {method} was rejected")]
    Authentication { user: String, method: &'static str },

    /// The private key could not be loaded.
    #[error("Cannot load key {path}: {reason}")]
    Key { path: String, reason: String },

    // ── Remote execution ────────────────────────────────────────────
    /// A scripted process exited non-zero.
    #[error("Command \"{command}\" execution failed with exit code {exit_code}")]
    Execution {
        command: String,
        exit_code: u32,
        stderr: String,
    },

    /// A scripted exchange saw a prompt other than the one expected.
    #[error("Unexpected prompt from \"{command}\": expected {expected:?}, got {received:?}")]
    ProtocolMismatch {
        command: String,
        expected: String,
        received: String,
    },

    // ── Local ───────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the failure happened below the command layer:
    /// connecting, handshaking, or a timed out / broken session.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::HostKeyRejected { .. }
                | Self::Timeout { .. }
                | Self::Transport(_)
                | Self::Authentication { .. }
        )
    }

    /// Returns `true` for a scripted prompt mismatch.
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, Self::ProtocolMismatch { .. })
    }
}

impl From<russh::Error> for Error {
    fn from(err: russh::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
