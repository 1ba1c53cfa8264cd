// ── Device catalog ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A WiFi band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
pub enum Band {
    #[strum(to_string = "2g", serialize = "2.4", serialize = "2")]
    TwoGhz,
    #[strum(to_string = "5g", serialize = "5")]
    FiveGhz,
}

impl Band {
    pub fn default_channel(self) -> u16 {
        match self {
            Self::TwoGhz => 6,
            Self::FiveGhz => 40,
        }
    }

    pub fn accepts_channel(self, channel: u16) -> bool {
        match self {
            Self::TwoGhz => (1..=14).contains(&channel),
            Self::FiveGhz => (36..=177).contains(&channel),
        }
    }
}

/// Radio hardware of a device type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioDescriptor {
    /// OpenWrt radio section, e.g. `radio0`.
    pub device: String,
    /// Kernel interface, e.g. `wlan0`.
    pub interface: String,
    #[serde(default)]
    pub driver: String,
}

impl fmt::Display for RadioDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.device, self.interface)?;
        if !self.driver.is_empty() {
            write!(f, " driver {}", self.driver)?;
        }
        Ok(())
    }
}

/// A known hardware model access points are built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceType {
    /// Catalog key, unique within the site.
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wlan2: Option<RadioDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wlan5: Option<RadioDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridged_wired_device: Option<String>,
}

impl DeviceType {
    pub fn radio(&self, band: Band) -> Option<&RadioDescriptor> {
        match band {
            Band::TwoGhz => self.wlan2.as_ref(),
            Band::FiveGhz => self.wlan5.as_ref(),
        }
    }

    /// Bands this hardware has a radio for, 2.4 GHz first.
    pub fn bands(&self) -> Vec<Band> {
        [Band::TwoGhz, Band::FiveGhz]
            .into_iter()
            .filter(|band| self.radio(*band).is_some())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn band_parses_common_spellings() {
        assert_eq!("2g".parse::<Band>().unwrap(), Band::TwoGhz);
        assert_eq!("2.4".parse::<Band>().unwrap(), Band::TwoGhz);
        assert_eq!("5".parse::<Band>().unwrap(), Band::FiveGhz);
        assert_eq!(Band::FiveGhz.to_string(), "5g");
    }

    #[test]
    fn channel_ranges() {
        assert!(Band::TwoGhz.accepts_channel(Band::TwoGhz.default_channel()));
        assert!(Band::FiveGhz.accepts_channel(Band::FiveGhz.default_channel()));
        assert!(!Band::TwoGhz.accepts_channel(36));
        assert!(!Band::FiveGhz.accepts_channel(6));
    }

    #[test]
    fn device_yaml_uses_camel_case() {
        let yaml = "name: c7\nmodel: Archer C7\ncpu: QCA9558\narchitecture: ath79\nwlan2:\n  device: radio1\n  interface: wlan1\nbridgedWiredDevice: eth0.1\n";
        let device: DeviceType = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(device.name, "c7");
        assert_eq!(device.bands(), vec![Band::TwoGhz]);
        assert_eq!(device.bridged_wired_device.as_deref(), Some("eth0.1"));
        assert_eq!(device.radio(Band::TwoGhz).unwrap().to_string(), "radio1 (wlan1)");
    }
}
