// ── OpenWrt rendering ──
//
// Every configuration push is one shell command: a `uci batch` fed from a
// heredoc, followed by commit and reload. If any part fails the pending
// changes are reverted and the command exits non-zero.

use std::fmt::Write as _;

use secrecy::ExposeSecret;
use wnetctl_ssh::shell_quote;

use super::RemoteAction;
use crate::model::{AccessPoint, AuthMode, Band, DeviceType, SiteModel, Ssid};

/// Package holding roaming neighbour lists.
const ROAMING_PACKAGE: &str = "wnetctl";
const ROAMING_SECTION: &str = "wnetctl.roaming";

/// OpenWrt with dropbear and uci.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenWrt;

impl OpenWrt {
    pub fn key_dir(self) -> &'static str {
        "/etc/dropbear"
    }

    pub fn authorized_keys(self) -> &'static str {
        wnetctl_ssh::DROPBEAR_AUTHORIZED_KEYS
    }

    /// Idempotent steps run once the admin password has been rotated.
    pub fn post_bootstrap(self, site: &SiteModel, device: &DeviceType) -> Vec<RemoteAction> {
        let mut actions = Vec::new();

        if let Some(country) = &site.country {
            let lines: Vec<String> = device
                .bands()
                .into_iter()
                .filter_map(|band| device.radio(band))
                .map(|radio| format!("set wireless.{}.country={}", radio.device, quote(country)))
                .collect();
            if !lines.is_empty() {
                actions.push(RemoteAction::new(
                    "set country code",
                    batch("wireless", &lines, true),
                ));
            }
        }

        actions.push(RemoteAction::new(
            "disable password login",
            batch(
                "dropbear",
                &[
                    "set dropbear.@dropbear[0].PasswordAuth='off'".to_owned(),
                    "set dropbear.@dropbear[0].RootPasswordAuth='off'".to_owned(),
                ],
                false,
            ),
        ));
        actions
    }

    /// Create or replace the SSID's interface on every band the AP has.
    pub fn push_ssid(self, site: &SiteModel, ap: &AccessPoint, device: &DeviceType, ssid: &Ssid) -> String {
        let mut lines = Vec::new();
        for band in bands_of(ap, device) {
            let Some(radio) = device.radio(band) else {
                continue;
            };
            let section = format!("wireless.{}", section_name(ssid, band));
            let suffix = match band {
                Band::TwoGhz => &site.ssid_suffix2,
                Band::FiveGhz => &site.ssid_suffix5,
            };
            let network = ssid.vlan.map_or_else(|| "lan".to_owned(), |vlan| format!("vlan{vlan}"));

            lines.push(format!("set {section}=wifi-iface"));
            lines.push(format!("set {section}.device={}", quote(&radio.device)));
            lines.push(format!("set {section}.mode='ap'"));
            lines.push(format!("set {section}.network={}", quote(&network)));
            lines.push(format!("set {section}.ssid={}", quote(&format!("{}{suffix}", ssid.name))));
            lines.push(format!("set {section}.encryption={}", quote(encryption(ssid.auth))));
            match &ssid.password {
                Some(key) => lines.push(format!("set {section}.key={}", quote(key.expose_secret()))),
                None => lines.push(format!("delete {section}.key")),
            }
            lines.push(format!("set {section}.isolate={}", quote(flag(ssid.restricted))));
            lines.push(format!("set {section}.ieee80211r='1'"));
            lines.push(format!("delete {section}.maclist"));
            if ssid.whitelisted {
                lines.push(format!("set {section}.macfilter='allow'"));
                for station in &ssid.stations {
                    lines.push(format!("add_list {section}.maclist={}", quote(station.mac.as_str())));
                }
            } else {
                lines.push(format!("set {section}.macfilter='disable'"));
            }
        }
        batch("wireless", &lines, true)
    }

    pub fn remove_ssid(self, ap: &AccessPoint, device: &DeviceType, ssid: &Ssid) -> String {
        let lines: Vec<String> = bands_of(ap, device)
            .into_iter()
            .map(|band| format!("delete wireless.{}", section_name(ssid, band)))
            .collect();
        batch("wireless", &lines, true)
    }

    /// Add `peer_id` to the roaming list. Removing first keeps it unique.
    pub fn add_neighbour(self, peer_id: &str) -> String {
        let lines = [
            format!("set {ROAMING_SECTION}=roaming"),
            format!("del_list {ROAMING_SECTION}.neighbour={}", quote(peer_id)),
            format!("add_list {ROAMING_SECTION}.neighbour={}", quote(peer_id)),
        ];
        format!(
            "touch /etc/config/{ROAMING_PACKAGE} && {}",
            batch(ROAMING_PACKAGE, &lines, false)
        )
    }

    pub fn remove_neighbour(self, peer_id: &str) -> String {
        let lines = [
            format!("set {ROAMING_SECTION}=roaming"),
            format!("del_list {ROAMING_SECTION}.neighbour={}", quote(peer_id)),
        ];
        format!(
            "touch /etc/config/{ROAMING_PACKAGE} && {}",
            batch(ROAMING_PACKAGE, &lines, false)
        )
    }

    /// Channel and transmit power for every band of the AP.
    pub fn apply_radios(self, ap: &AccessPoint, device: &DeviceType) -> String {
        let mut lines = Vec::new();
        for band in bands_of(ap, device) {
            let (Some(radio), Some(state)) = (device.radio(band), ap.radio(band)) else {
                continue;
            };
            let section = format!("wireless.{}", radio.device);
            lines.push(format!("set {section}.channel='{}'", state.channel));
            match state.power {
                Some(power) => lines.push(format!("set {section}.txpower='{power}'")),
                None => lines.push(format!("delete {section}.txpower")),
            }
        }
        batch("wireless", &lines, true)
    }
}

/// Bands present on both the hardware and the AP record.
fn bands_of(ap: &AccessPoint, device: &DeviceType) -> Vec<Band> {
    device
        .bands()
        .into_iter()
        .filter(|band| ap.radio(*band).is_some())
        .collect()
}

fn section_name(ssid: &Ssid, band: Band) -> String {
    let slug: String = ssid
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("wnet_{slug}_{band}")
}

fn encryption(auth: AuthMode) -> &'static str {
    match auth {
        AuthMode::Open => "none",
        AuthMode::Psk2 => "psk2",
        AuthMode::Sae => "sae",
        AuthMode::SaeMixed => "sae-mixed",
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// uci values are always single-quoted.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn batch(package: &str, lines: &[String], reload_wifi: bool) -> String {
    let mut script = format!("uci -q batch <<'WNETCTL_EOF' && uci commit {package}");
    if reload_wifi {
        script.push_str(" && wifi reload");
    }
    let _ = write!(
        script,
        " || {{ uci -q revert {package}; exit 1; }}\n{}\nWNETCTL_EOF\n",
        lines.join("\n")
    );
    script
}

/// `test -d` check for a directory.
pub(crate) fn dir_exists(path: &str) -> String {
    format!("test -d {}", shell_quote(path))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::model::{MacAddress, RadioDescriptor, Station};

    fn device() -> DeviceType {
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

    fn site() -> SiteModel {
        let mut site = SiteModel::new("/k", "/k.pub");
        site.ssid_suffix5 = "-5G".into();
        site.country = Some("DE".into());
        site
    }

    #[test]
    fn radios_render_channel_and_power() {
        let mut ap = AccessPoint::new("hall", &device(), "10.0.0.2".parse().unwrap(), None);
        ap.wlan5.as_mut().unwrap().power = Some(17);

        let script = OpenWrt.apply_radios(&ap, &device());

        insta::assert_snapshot!(script, @r"
        uci -q batch <<'WNETCTL_EOF' && uci commit wireless && wifi reload || { uci -q revert wireless; exit 1; }
        set wireless.radio1.channel='6'
        delete wireless.radio1.txpower
        set wireless.radio0.channel='40'
        set wireless.radio0.txpower='17'
        WNETCTL_EOF
        ");
    }

    #[test]
    fn whitelisted_ssid_lists_stations_on_both_bands() {
        let ap = AccessPoint::new("hall", &device(), "10.0.0.2".parse().unwrap(), None);
        let mut ssid = Ssid::new("Home Net", AuthMode::Psk2, Some(SecretString::from("it's-a-secret".to_string())));
        ssid.vlan = Some(20);
        ssid.whitelisted = true;
        ssid.upsert_station(Station {
            mac: MacAddress::parse("00:11:22:33:44:55").unwrap(),
            name: "tv".into(),
            comment: String::new(),
        });

        let script = OpenWrt.push_ssid(&site(), &ap, &device(), &ssid);

        assert!(script.contains("set wireless.wnet_home_net_2g.ssid='Home Net'\n"));
        assert!(script.contains("set wireless.wnet_home_net_5g.ssid='Home Net-5G'\n"));
        assert!(script.contains("set wireless.wnet_home_net_5g.network='vlan20'\n"));
        assert!(script.contains(r"set wireless.wnet_home_net_2g.key='it'\''s-a-secret'"));
        assert_eq!(script.matches("add_list wireless.wnet_home_net_").count(), 2);
        assert!(script.contains("macfilter='allow'"));
    }

    #[test]
    fn open_ssid_drops_key_and_filter() {
        let ap = AccessPoint::new("hall", &device(), "10.0.0.2".parse().unwrap(), None);
        let ssid = Ssid::new("guest", AuthMode::Open, None);

        let script = OpenWrt.push_ssid(&site(), &ap, &device(), &ssid);

        assert!(script.contains("set wireless.wnet_guest_2g.encryption='none'"));
        assert!(script.contains("delete wireless.wnet_guest_2g.key"));
        assert!(script.contains("macfilter='disable'"));
        assert!(script.contains("set wireless.wnet_guest_2g.network='lan'"));
    }

    #[test]
    fn neighbour_edits_are_idempotent_list_operations() {
        let add = OpenWrt.add_neighbour("aa_bb_cc_dd_ee_ff");
        let del_at = add.find("del_list wnetctl.roaming.neighbour='aa_bb_cc_dd_ee_ff'").unwrap();
        let add_at = add.find("add_list wnetctl.roaming.neighbour='aa_bb_cc_dd_ee_ff'").unwrap();
        assert!(del_at < add_at);

        let remove = OpenWrt.remove_neighbour("aa_bb_cc_dd_ee_ff");
        assert!(!remove.contains("add_list"));
        assert!(remove.contains("uci commit wnetctl"));
    }

    #[test]
    fn post_bootstrap_sets_country_then_locks_dropbear() {
        let actions = OpenWrt.post_bootstrap(&site(), &device());
        assert_eq!(actions.len(), 2);
        assert!(actions[0].command.contains("set wireless.radio1.country='DE'"));
        assert!(actions[0].command.contains("set wireless.radio0.country='DE'"));
        assert!(actions[1].command.contains("PasswordAuth='off'"));
    }

    #[test]
    fn post_bootstrap_without_country_only_locks_dropbear() {
        let mut site = site();
        site.country = None;
        let actions = OpenWrt.post_bootstrap(&site, &device());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].label, "disable password login");
    }
}
