// ── Command API ──
//
// All site mutations flow through a unified `Command` enum. The site
// handle routes each variant to the orchestration method that validates,
// provisions devices, and commits.

use std::net::IpAddr;

use crate::model::{AccessPoint, Band, DeviceType, MacAddress, Ssid, Station};

/// Request to provision a new access point.
#[derive(Debug, Clone)]
pub struct AddAccessPointRequest {
    pub name: String,
    /// Device-type key in the site catalog.
    pub model: String,
    pub ip: IpAddr,
    pub mac: Option<MacAddress>,
    /// Accept the device's host key without prior knowledge.
    pub trust_on_first_use: bool,
}

/// Request to retune one radio of an access point.
#[derive(Debug, Clone)]
pub struct TuneRadioRequest {
    pub name: String,
    pub band: Band,
    pub channel: Option<u16>,
    /// `Some(None)` resets to the driver default.
    pub power: Option<Option<u8>>,
}

/// All possible write operations against a site.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Access points ────────────────────────────────────────────────
    AddAccessPoint(AddAccessPointRequest),
    RemoveAccessPoint { name: String },
    TuneAccessPoint(TuneRadioRequest),

    // ── SSIDs ────────────────────────────────────────────────────────
    AddSsid(Ssid),
    /// Replace an SSID's definition and re-push it everywhere.
    UpdateSsid(Ssid),
    RemoveSsid { name: String },

    // ── Stations ─────────────────────────────────────────────────────
    AddStation { ssid: String, station: Station },
    RemoveStation { ssid: String, mac: MacAddress },

    // ── Device catalog ───────────────────────────────────────────────
    AddDeviceType(DeviceType),
    RemoveDeviceType { name: String },
}

impl Command {
    /// Short operation name used in logs and compensation warnings.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::AddAccessPoint(_) => "add access point",
            Self::RemoveAccessPoint { .. } => "remove access point",
            Self::TuneAccessPoint(_) => "tune access point",
            Self::AddSsid(_) => "add ssid",
            Self::UpdateSsid(_) => "update ssid",
            Self::RemoveSsid { .. } => "remove ssid",
            Self::AddStation { .. } => "add station",
            Self::RemoveStation { .. } => "remove station",
            Self::AddDeviceType(_) => "add device type",
            Self::RemoveDeviceType { .. } => "remove device type",
        }
    }
}

/// Outcome of a successful command.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    /// The access point as committed, including its pinned host key.
    AccessPoint(Box<AccessPoint>),
}
