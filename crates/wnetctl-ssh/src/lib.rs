//! Async SSH remote execution for access point provisioning.
//!
//! - **[`Connector`] / [`RemoteChannel`]**: the seam used by `wnetctl-core`.
//!   [`SshConnector`] implements it over russh; with the `mock` feature,
//!   [`mock::MockConnector`] implements it in memory.
//! - **[`InteractiveScript`]**: a command plus an explicit expect/respond
//!   step list, driven over any [`ScriptIo`]. [`install_public_key`] and
//!   [`change_password`] are the two scripts used during bootstrap.
//! - **[`HostKeyPolicy`]**: host keys are always verified, either against a
//!   pinned fingerprint, a `known_hosts` file, or explicitly on first use.

pub mod auth;
pub mod channel;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod script;
pub mod session;

pub use auth::{AuthMethod, DEFAULT_PORT, HostKeyPolicy, Target};
pub use channel::{CommandOutput, Connector, RemoteChannel};
pub use error::Error;
pub use script::{
    DROPBEAR_AUTHORIZED_KEYS, ExitReport, InteractiveScript, ScriptIo, Step, change_password,
    install_public_key, shell_quote,
};
pub use session::{SshChannel, SshConnector};
