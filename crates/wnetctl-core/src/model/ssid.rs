// ── SSIDs and stations ──

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::mac::MacAddress;
use super::secret;
use crate::error::CoreError;

const MIN_PASSPHRASE: usize = 8;
const MAX_PASSPHRASE: usize = 63;

/// WiFi authentication mode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AuthMode {
    #[serde(rename = "open")]
    #[strum(serialize = "open")]
    Open,
    #[default]
    #[serde(rename = "psk2")]
    #[strum(serialize = "psk2")]
    Psk2,
    #[serde(rename = "sae")]
    #[strum(serialize = "sae")]
    Sae,
    #[serde(rename = "sae-mixed")]
    #[strum(serialize = "sae-mixed")]
    SaeMixed,
}

impl AuthMode {
    pub fn requires_secret(self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// A client allowed on a whitelisted SSID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub mac: MacAddress,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// A wireless network broadcast by every access point of the site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ssid {
    pub name: String,
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "secret::serialize_opt"
    )]
    pub password: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    /// Clients of this network cannot reach each other.
    #[serde(default)]
    pub restricted: bool,
    /// Only listed stations may associate.
    #[serde(default)]
    pub whitelisted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stations: Vec<Station>,
}

impl Ssid {
    pub fn new(name: impl Into<String>, auth: AuthMode, password: Option<SecretString>) -> Self {
        Self {
            name: name.into(),
            auth,
            password,
            vlan: None,
            restricted: false,
            whitelisted: false,
            stations: Vec::new(),
        }
    }

    /// Check name, secret and VLAN rules.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(invalid("SSID name must not be empty"));
        }
        if self.name.len() > 32 {
            return Err(invalid(format!("SSID name \"{}\" exceeds 32 bytes", self.name)));
        }

        match (&self.password, self.auth.requires_secret()) {
            (None, true) => {
                return Err(invalid(format!(
                    "SSID \"{}\" uses {} and needs a password",
                    self.name, self.auth
                )));
            }
            (Some(secret), true) => {
                let len = secret.expose_secret().chars().count();
                if !(MIN_PASSPHRASE..=MAX_PASSPHRASE).contains(&len) {
                    return Err(invalid(format!(
                        "SSID \"{}\" password must be {MIN_PASSPHRASE}-{MAX_PASSPHRASE} characters",
                        self.name
                    )));
                }
            }
            (Some(_), false) => {
                return Err(invalid(format!("open SSID \"{}\" cannot have a password", self.name)));
            }
            (None, false) => {}
        }

        if let Some(vlan) = self.vlan {
            if !(1..=4094).contains(&vlan) {
                return Err(invalid(format!("VLAN {vlan} is outside 1-4094")));
            }
        }
        Ok(())
    }

    pub fn station(&self, mac: &MacAddress) -> Option<&Station> {
        self.stations.iter().find(|s| s.mac == *mac)
    }

    /// Insert or replace by MAC. Returns `true` when the station is new.
    pub fn upsert_station(&mut self, station: Station) -> bool {
        if let Some(existing) = self.stations.iter_mut().find(|s| s.mac == station.mac) {
            *existing = station;
            false
        } else {
            self.stations.push(station);
            true
        }
    }

    pub fn remove_station(&mut self, mac: &MacAddress) -> Option<Station> {
        let pos = self.stations.iter().position(|s| s.mac == *mac)?;
        Some(self.stations.remove(pos))
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vlan {
            Some(vlan) => write!(f, "{} on vlan {vlan}, auth {}", self.name, self.auth),
            None => write!(f, "{} on default vlan, auth {}", self.name, self.auth),
        }
    }
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::Validation {
        message: message.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Option<SecretString> {
        Some(SecretString::from(s.to_string()))
    }

    fn station(mac: &str, name: &str) -> Station {
        Station {
            mac: MacAddress::parse(mac).unwrap(),
            name: name.into(),
            comment: String::new(),
        }
    }

    #[test]
    fn psk_requires_password_of_valid_length() {
        assert!(Ssid::new("home", AuthMode::Psk2, None).validate().is_err());
        assert!(Ssid::new("home", AuthMode::Psk2, secret("short")).validate().is_err());
        assert!(Ssid::new("home", AuthMode::Sae, secret(&"x".repeat(64))).validate().is_err());
        Ssid::new("home", AuthMode::SaeMixed, secret("longenough")).validate().unwrap();
    }

    #[test]
    fn open_network_rejects_password() {
        Ssid::new("guest", AuthMode::Open, None).validate().unwrap();
        assert!(Ssid::new("guest", AuthMode::Open, secret("longenough")).validate().is_err());
    }

    #[test]
    fn vlan_must_be_in_range() {
        let mut ssid = Ssid::new("iot", AuthMode::Open, None);
        ssid.vlan = Some(0);
        assert!(ssid.validate().is_err());
        ssid.vlan = Some(4095);
        assert!(ssid.validate().is_err());
        ssid.vlan = Some(20);
        ssid.validate().unwrap();
    }

    #[test]
    fn upsert_station_is_keyed_by_mac() {
        let mut ssid = Ssid::new("home", AuthMode::Open, None);
        assert!(ssid.upsert_station(station("aa:bb:cc:dd:ee:ff", "phone")));
        assert!(!ssid.upsert_station(station("AA-BB-CC-DD-EE-FF", "phone (new)")));
        assert_eq!(ssid.stations.len(), 1);
        assert_eq!(ssid.stations[0].name, "phone (new)");
    }

    #[test]
    fn auth_mode_round_trips_through_strings() {
        assert_eq!("sae-mixed".parse::<AuthMode>().unwrap(), AuthMode::SaeMixed);
        assert_eq!(AuthMode::Psk2.to_string(), "psk2");
        let yaml = serde_yaml::to_string(&AuthMode::SaeMixed).unwrap();
        assert_eq!(yaml.trim(), "sae-mixed");
    }
}
