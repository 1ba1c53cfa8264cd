// ── MAC addresses ──
//
// Stations are keyed by MAC inside an SSID and neighbours are keyed by
// roaming id derived from the MAC, so every address is validated and
// normalized once, at the edge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse colon-separated, dash-separated, or bare hex input. Grouped
    /// input must use one separator between six two-digit groups.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let raw = raw.as_ref().trim();
        let groups: Vec<&str> = match (raw.contains(':'), raw.contains('-')) {
            (false, false) => (0..6).filter_map(|i| raw.get(i * 2..i * 2 + 2)).collect(),
            (true, false) => raw.split(':').collect(),
            (false, true) => raw.split('-').collect(),
            (true, true) => Vec::new(),
        };

        let bare_len_ok = raw.contains([':', '-']) || raw.len() == 12;
        let well_formed = bare_len_ok
            && groups.len() == 6
            && groups
                .iter()
                .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()));
        if !well_formed {
            return Err(CoreError::Validation {
                message: format!("invalid MAC address \"{raw}\""),
            });
        }

        Ok(Self(groups.join(":").to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier used for this radio in roaming neighbour lists.
    pub fn roaming_id(&self) -> String {
        self.0.replace(':', "_")
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dashes() {
        let mac = MacAddress::parse("AA-BB-CC-DD-EE-FF").unwrap();
        assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn normalizes_case() {
        let mac: MacAddress = "AA:BB:CC:DD:EE:0F".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:0f");
    }

    #[test]
    fn accepts_bare_hex() {
        let mac = MacAddress::parse("001122AABBCC").unwrap();
        assert_eq!(mac.as_str(), "00:11:22:aa:bb:cc");
    }

    #[test]
    fn rejects_garbage() {
        for raw in [
            "",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:gg",
            "aabb:ccdd:eeff",
            "aa:bb:cc:dd:ee:ff:00",
            "aabbccddeeff:::::",
            "aa:bb:cc:dd-ee:ff",
            "a:abb:cc:dd:ee:ff",
            "aabbccddeef",
            "aabbccddeeff00",
            "+abbccddeeff",
        ] {
            assert!(
                matches!(MacAddress::parse(raw), Err(CoreError::Validation { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn roaming_id_replaces_colons() {
        let mac = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(mac.roaming_id(), "aa_bb_cc_dd_ee_ff");
    }

    #[test]
    fn deserialize_validates() {
        let ok: MacAddress = serde_yaml::from_str("AA-BB-CC-DD-EE-FF").unwrap();
        assert_eq!(ok.as_str(), "aa:bb:cc:dd:ee:ff");
        assert!(serde_yaml::from_str::<MacAddress>("nope").is_err());
    }
}
