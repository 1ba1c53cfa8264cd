//! Site model and compensating orchestration for OpenWrt access points.
//!
//! - **[`SiteHandle`]**: owns one site. Every mutation validates against a
//!   snapshot, applies remote edits device by device, undoes the completed
//!   prefix when a later device fails, then commits and persists the new
//!   [`SiteModel`]. Undo failures surface through
//!   [`take_warnings()`](SiteHandle::take_warnings).
//!
//! - **[`AccessPointAgent`]**: per-device remote steps (bootstrap, SSID push,
//!   roaming neighbours, radios) rendered by a [`Backend`] and run over any
//!   [`wnetctl_ssh::Connector`].
//!
//! - **[`Command`]**: typed mutation requests routed by
//!   [`SiteHandle::execute`].
//!
//! - **[`PersistentStore`]**: whole-document load/save. [`YamlStore`] writes
//!   atomically with owner-only permissions.

pub mod agent;
pub mod command;
pub mod error;
pub mod model;
pub mod site;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use agent::{AccessPointAgent, Backend, Bootstrapped, RemoteAction};
pub use command::{AddAccessPointRequest, Command, CommandResult, TuneRadioRequest};
pub use error::{CompensationWarning, CoreError};
pub use site::SiteHandle;
pub use store::{MemoryStore, PersistentStore, StoreError, YamlStore, from_yaml, to_yaml};

pub use model::{
    AccessPoint, AuthMode, BackendKind, Band, DEFAULT_ADMIN_USER, DeviceType, MacAddress,
    RadioDescriptor, RadioState, SiteModel, Ssid, Station, TrustState,
};
