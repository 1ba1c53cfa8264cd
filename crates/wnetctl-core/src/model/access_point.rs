// ── Access point domain type ──

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use strum::Display;

use super::device_type::{Band, DeviceType};
use super::mac::MacAddress;
use crate::error::CoreError;

/// How far bootstrap has progressed on a device. Only moves forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TrustState {
    #[default]
    Untrusted,
    KeyInstalled,
    PasswordRotated,
    Bootstrapped,
}

impl TrustState {
    /// Move to `next`. Staying put is allowed; going back is not.
    pub fn advance(&mut self, next: TrustState) -> Result<(), CoreError> {
        if next < *self {
            return Err(CoreError::Validation {
                message: format!("trust state cannot go from {self} back to {next}"),
            });
        }
        *self = next;
        Ok(())
    }
}

/// Per-band radio settings of one access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioState {
    pub channel: u16,
    /// Transmit power in dBm; `None` leaves the driver default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<MacAddress>,
}

impl RadioState {
    pub fn with_default_channel(band: Band) -> Self {
        Self {
            channel: band.default_channel(),
            power: None,
            mac: None,
        }
    }
}

/// A managed access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPoint {
    /// Unique within the site.
    pub name: String,
    /// Device-type key in the site catalog.
    pub model: String,
    pub ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wlan2: Option<RadioState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wlan5: Option<RadioState>,
    #[serde(default)]
    pub trust: TrustState,
    /// SHA-256 host key fingerprint pinned during bootstrap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key: Option<String>,
    /// Names of peer access points, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbours: Vec<String>,
}

impl AccessPoint {
    /// A fresh, untrusted access point with default channels on every
    /// band the hardware has.
    pub fn new(name: impl Into<String>, device: &DeviceType, ip: IpAddr, mac: Option<MacAddress>) -> Self {
        Self {
            name: name.into(),
            model: device.name.clone(),
            ip,
            mac,
            wlan2: device.wlan2.as_ref().map(|_| RadioState::with_default_channel(Band::TwoGhz)),
            wlan5: device.wlan5.as_ref().map(|_| RadioState::with_default_channel(Band::FiveGhz)),
            trust: TrustState::Untrusted,
            host_key: None,
            neighbours: Vec::new(),
        }
    }

    pub fn radio(&self, band: Band) -> Option<&RadioState> {
        match band {
            Band::TwoGhz => self.wlan2.as_ref(),
            Band::FiveGhz => self.wlan5.as_ref(),
        }
    }

    pub fn radio_mut(&mut self, band: Band) -> Option<&mut RadioState> {
        match band {
            Band::TwoGhz => self.wlan2.as_mut(),
            Band::FiveGhz => self.wlan5.as_mut(),
        }
    }

    /// Key under which peers list this AP for roaming.
    pub fn roaming_id(&self) -> String {
        self.mac
            .as_ref()
            .map_or_else(|| self.name.clone(), MacAddress::roaming_id)
    }

    /// Insert `peer` into the neighbour list, keeping it sorted and unique.
    pub fn link(&mut self, peer: &str) {
        if let Err(pos) = self.neighbours.binary_search_by(|n| n.as_str().cmp(peer)) {
            self.neighbours.insert(pos, peer.to_owned());
        }
    }

    pub fn unlink(&mut self, peer: &str) {
        self.neighbours.retain(|n| n != peer);
    }
}

impl fmt::Display for AccessPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mac = self.mac.as_ref().map_or("unknown", MacAddress::as_str);
        write!(f, "AP {} ({}) IP {}, MAC {}", self.name, self.model, self.ip, mac)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::device_type::RadioDescriptor;

    fn dual_band() -> DeviceType {
        DeviceType {
            name: "c7".into(),
            model: "Archer C7".into(),
            cpu: String::new(),
            architecture: String::new(),
            wlan2: Some(RadioDescriptor {
                device: "radio1".into(),
                interface: "wlan1".into(),
                driver: String::new(),
            }),
            wlan5: Some(RadioDescriptor {
                device: "radio0".into(),
                interface: "wlan0".into(),
                driver: String::new(),
            }),
            bridged_wired_device: None,
        }
    }

    #[test]
    fn new_ap_gets_default_channels() {
        let ap = AccessPoint::new("hall", &dual_band(), "10.0.0.2".parse().unwrap(), None);
        assert_eq!(ap.wlan2.as_ref().unwrap().channel, 6);
        assert_eq!(ap.wlan5.as_ref().unwrap().channel, 40);
        assert_eq!(ap.trust, TrustState::Untrusted);
    }

    #[test]
    fn single_band_device_has_no_5ghz_state() {
        let mut device = dual_band();
        device.wlan5 = None;
        let ap = AccessPoint::new("hall", &device, "10.0.0.2".parse().unwrap(), None);
        assert!(ap.radio(Band::FiveGhz).is_none());
    }

    #[test]
    fn roaming_id_prefers_mac() {
        let mut ap = AccessPoint::new("hall", &dual_band(), "10.0.0.2".parse().unwrap(), None);
        assert_eq!(ap.roaming_id(), "hall");
        ap.mac = Some(MacAddress::parse("AA:BB:CC:00:11:22").unwrap());
        assert_eq!(ap.roaming_id(), "aa_bb_cc_00_11_22");
    }

    #[test]
    fn link_keeps_neighbours_sorted_and_unique() {
        let mut ap = AccessPoint::new("hall", &dual_band(), "10.0.0.2".parse().unwrap(), None);
        ap.link("yard");
        ap.link("attic");
        ap.link("yard");
        assert_eq!(ap.neighbours, vec!["attic", "yard"]);
        ap.unlink("attic");
        assert_eq!(ap.neighbours, vec!["yard"]);
    }

    #[test]
    fn trust_only_moves_forward() {
        let mut trust = TrustState::Untrusted;
        trust.advance(TrustState::KeyInstalled).unwrap();
        trust.advance(TrustState::KeyInstalled).unwrap();
        trust.advance(TrustState::Bootstrapped).unwrap();
        assert!(trust.advance(TrustState::PasswordRotated).is_err());
        assert_eq!(trust, TrustState::Bootstrapped);
    }
}
