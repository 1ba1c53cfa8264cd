// ── Site aggregate ──
//
// `SiteModel` owns the whole topology. It is only ever replaced as a
// unit: orchestrator mutations clone it, edit the clone, and swap it in.

use std::collections::BTreeMap;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

use super::access_point::AccessPoint;
use super::device_type::DeviceType;
use super::secret;
use super::ssid::Ssid;
use crate::error::CoreError;

pub const DEFAULT_ADMIN_USER: &str = "root";

/// Device firmware family a site provisions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum BackendKind {
    #[default]
    #[serde(rename = "openwrt")]
    #[strum(serialize = "openwrt")]
    OpenWrt,
}

fn default_admin_user() -> String {
    DEFAULT_ADMIN_USER.to_owned()
}

/// The aggregate root: credentials, catalog, access points and SSIDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteModel {
    #[serde(default)]
    pub backend: BackendKind,
    /// Private key used for every session after bootstrap.
    #[serde(default)]
    pub ssh_key: PathBuf,
    /// Public key installed on access points during bootstrap.
    #[serde(default)]
    pub ssh_public_key: PathBuf,
    /// Admin password rotated onto every access point.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "secret::serialize_opt"
    )]
    pub password: Option<SecretString>,
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    /// Factory password of fresh devices; empty when unset.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "secret::serialize_opt"
    )]
    pub initial_password: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, rename = "ssidSuffix2")]
    pub ssid_suffix2: String,
    #[serde(default, rename = "ssidSuffix5")]
    pub ssid_suffix5: String,
    /// Indexed by name; a sequence of records in the document.
    #[serde(default, with = "by_name")]
    pub access_points: BTreeMap<String, AccessPoint>,
    #[serde(default)]
    pub ssids: Vec<Ssid>,
    #[serde(default, with = "by_name")]
    pub devices: BTreeMap<String, DeviceType>,
}

impl SiteModel {
    pub fn new(ssh_key: impl Into<PathBuf>, ssh_public_key: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::OpenWrt,
            ssh_key: ssh_key.into(),
            ssh_public_key: ssh_public_key.into(),
            password: None,
            admin_user: default_admin_user(),
            initial_password: None,
            country: None,
            ssid_suffix2: String::new(),
            ssid_suffix5: String::new(),
            access_points: BTreeMap::new(),
            ssids: Vec::new(),
            devices: BTreeMap::new(),
        }
    }

    /// Bootstrap password of fresh devices.
    pub fn initial_password(&self) -> SecretString {
        self.initial_password
            .clone()
            .unwrap_or_else(|| SecretString::from(String::new()))
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn device(&self, name: &str) -> Result<&DeviceType, CoreError> {
        self.devices.get(name).ok_or_else(|| CoreError::NotFound {
            entity_type: "device type",
            identifier: name.to_owned(),
        })
    }

    pub fn access_point(&self, name: &str) -> Result<&AccessPoint, CoreError> {
        self.access_points.get(name).ok_or_else(|| CoreError::NotFound {
            entity_type: "access point",
            identifier: name.to_owned(),
        })
    }

    pub fn ssid(&self, name: &str) -> Result<&Ssid, CoreError> {
        self.ssids
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ssid_not_found(name))
    }

    pub fn ssid_mut(&mut self, name: &str) -> Result<&mut Ssid, CoreError> {
        self.ssids
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ssid_not_found(name))
    }

    /// Every access point except `name`, in name order.
    pub fn peers_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AccessPoint> + 'a {
        self.access_points.values().filter(move |ap| ap.name != name)
    }

    /// Access points built from device type `device`.
    pub fn users_of<'a>(&'a self, device: &'a str) -> impl Iterator<Item = &'a AccessPoint> + 'a {
        self.access_points.values().filter(move |ap| ap.model == device)
    }

    // ── Integrity ────────────────────────────────────────────────────

    /// Check cross-references and uniqueness.
    pub fn validate(&self) -> Result<(), CoreError> {
        for ap in self.access_points.values() {
            if !self.devices.contains_key(&ap.model) {
                return Err(CoreError::Validation {
                    message: format!(
                        "access point \"{}\" uses unknown device type \"{}\"",
                        ap.name, ap.model
                    ),
                });
            }
            if let Some(missing) = ap
                .neighbours
                .iter()
                .find(|n| !self.access_points.contains_key(n.as_str()))
            {
                return Err(CoreError::Validation {
                    message: format!(
                        "access point \"{}\" lists unknown neighbour \"{missing}\"",
                        ap.name
                    ),
                });
            }
        }

        for (i, ssid) in self.ssids.iter().enumerate() {
            if self.ssids[..i].iter().any(|other| other.name == ssid.name) {
                return Err(CoreError::Validation {
                    message: format!("SSID \"{}\" is defined twice", ssid.name),
                });
            }
        }
        Ok(())
    }
}

// ── Named records ───────────────────────────────────────────────────

/// A record keyed by its own `name` field.
pub(crate) trait Named {
    const KIND: &'static str;
    fn name(&self) -> &str;
}

impl Named for AccessPoint {
    const KIND: &'static str = "access point";
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for DeviceType {
    const KIND: &'static str = "device type";
    fn name(&self) -> &str {
        &self.name
    }
}

/// Index records by name. Empty and repeated names are rejected.
pub(crate) fn index_by_name<T: Named>(records: Vec<T>) -> Result<BTreeMap<String, T>, CoreError> {
    let mut index = BTreeMap::new();
    for record in records {
        let name = record.name().to_owned();
        if name.trim().is_empty() {
            return Err(CoreError::Validation {
                message: format!("{} without a name", T::KIND),
            });
        }
        if index.contains_key(&name) {
            return Err(CoreError::Validation {
                message: format!("{} \"{name}\" is defined twice", T::KIND),
            });
        }
        index.insert(name, record);
    }
    Ok(index)
}

mod by_name {
    use super::{BTreeMap, Deserialize, Deserializer, Named, Serialize, Serializer, index_by_name};

    pub fn serialize<S, T>(index: &BTreeMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(index.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Named + Deserialize<'de>,
    {
        let records = Vec::<T>::deserialize(deserializer)?;
        index_by_name(records).map_err(serde::de::Error::custom)
    }
}

fn ssid_not_found(name: &str) -> CoreError {
    CoreError::NotFound {
        entity_type: "SSID",
        identifier: name.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::device_type::RadioDescriptor;

    fn site_with_ap(model: &str) -> SiteModel {
        let mut site = SiteModel::new("/keys/id", "/keys/id.pub");
        site.devices.insert(
            "c7".into(),
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
                wlan5: None,
                bridged_wired_device: None,
            },
        );
        let device = site.devices["c7"].clone();
        let mut ap = AccessPoint::new("hall", &device, "10.0.0.2".parse().unwrap(), None);
        ap.model = model.into();
        site.access_points.insert("hall".into(), ap);
        site
    }

    #[test]
    fn validate_accepts_consistent_site() {
        site_with_ap("c7").validate().unwrap();
    }

    #[test]
    fn validate_rejects_unknown_model() {
        let err = site_with_ap("ghost").validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn records_are_written_as_sequences_with_names() {
        let site = site_with_ap("c7");
        let yaml = serde_yaml::to_string(&site).unwrap();
        assert!(yaml.contains("devices:\n- name: c7\n"), "{yaml}");
        assert!(yaml.contains("accessPoints:\n- name: hall\n"), "{yaml}");
    }

    #[test]
    fn index_rejects_repeated_and_empty_names() {
        let site = site_with_ap("c7");
        let hall = site.access_points["hall"].clone();

        let err = index_by_name(vec![hall.clone(), hall.clone()]).unwrap_err();
        assert!(
            matches!(&err, CoreError::Validation { message } if message.contains("\"hall\" is defined twice")),
            "got {err:?}"
        );

        let mut unnamed = hall;
        unnamed.name.clear();
        assert!(matches!(index_by_name(vec![unnamed]), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn missing_ssid_is_not_found() {
        let site = site_with_ap("c7");
        assert!(matches!(site.ssid("nope"), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn defaults_for_bootstrap_credentials() {
        let site = SiteModel::new("/k", "/k.pub");
        assert_eq!(site.admin_user, "root");
        assert!(secrecy::ExposeSecret::expose_secret(&site.initial_password()).is_empty());
    }
}
