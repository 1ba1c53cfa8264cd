// ── Remote channel abstraction ──
//
// The seam between provisioning logic and the wire. `wnetctl-core` is
// generic over `Connector`, so the russh session and the in-memory mock
// are interchangeable.

use std::future::Future;

use crate::auth::{AuthMethod, Target};
use crate::error::Error;
use crate::script::InteractiveScript;

/// Captured result of a non-interactive command.
///
/// A non-zero `exit_code` is not an error at this layer; checks such as
/// `test -d` rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Opens authenticated sessions.
pub trait Connector: Send + Sync {
    type Channel: RemoteChannel;

    fn open(
        &self,
        target: &Target,
        auth: &AuthMethod,
    ) -> impl Future<Output = Result<Self::Channel, Error>> + Send;
}

/// An authenticated session to one device.
pub trait RemoteChannel: Send {
    /// Run `command` to completion and capture its output.
    fn run(&mut self, command: &str) -> impl Future<Output = Result<CommandOutput, Error>> + Send;

    /// Launch the script's command and drive its prompts.
    fn run_interactive(
        &mut self,
        script: &InteractiveScript,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// SHA-256 fingerprint of the host key seen during the handshake.
    fn host_key_fingerprint(&self) -> Option<String>;

    /// Disconnect. Errors are logged, not returned.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}
