// ── Access point agent ──
//
// Everything the orchestrator does to a single device goes through
// `AccessPointAgent`: bootstrap, SSID push/remove, neighbour edits and
// radio tuning. Each call opens its own session and closes it before
// returning, so a failed device never holds a connection.

mod openwrt;

use std::path::PathBuf;

use tracing::{debug, info};
use wnetctl_ssh::{
    AuthMethod, Connector, HostKeyPolicy, RemoteChannel, Target, change_password,
    install_public_key, shell_quote,
};

pub use openwrt::OpenWrt;
pub use wnetctl_ssh::DEFAULT_PORT;

use crate::error::CoreError;
use crate::model::{AccessPoint, BackendKind, SiteModel, Ssid, TrustState};

/// One idempotent remote step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAction {
    pub label: &'static str,
    pub command: String,
}

impl RemoteAction {
    pub fn new(label: &'static str, command: String) -> Self {
        Self { label, command }
    }
}

/// Firmware-specific rendering. One variant per supported family.
#[derive(Debug, Clone, Copy)]
pub enum Backend {
    OpenWrt(OpenWrt),
}

impl From<BackendKind> for Backend {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::OpenWrt => Self::OpenWrt(OpenWrt),
        }
    }
}

/// Result of a completed bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrapped {
    pub trust: TrustState,
    /// Fingerprint observed on the bootstrap session, to be pinned.
    pub host_key: Option<String>,
}

/// Drives one device at a time over a [`Connector`].
#[derive(Debug, Clone)]
pub struct AccessPointAgent<C> {
    connector: C,
    backend: Backend,
    port: u16,
    known_hosts: Option<PathBuf>,
}

impl<C: Connector> AccessPointAgent<C> {
    pub fn new(connector: C, backend: Backend) -> Self {
        Self {
            connector,
            backend,
            port: DEFAULT_PORT,
            known_hosts: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Verify hosts without a pinned key against this `known_hosts` file.
    #[must_use]
    pub fn with_known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = Some(path.into());
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    // ── Sessions ─────────────────────────────────────────────────────

    fn host_key_policy(&self, ap: &AccessPoint, trust_on_first_use: bool) -> Result<HostKeyPolicy, CoreError> {
        if let Some(pinned) = &ap.host_key {
            return Ok(HostKeyPolicy::Fingerprint(pinned.clone()));
        }
        if let Some(path) = &self.known_hosts {
            return Ok(HostKeyPolicy::KnownHosts(path.clone()));
        }
        if trust_on_first_use {
            return Ok(HostKeyPolicy::TrustOnFirstUse);
        }
        Err(CoreError::Validation {
            message: format!(
                "no host key pinned for access point \"{}\" and no known_hosts file configured",
                ap.name
            ),
        })
    }

    fn target(&self, ap: &AccessPoint, site: &SiteModel, policy: HostKeyPolicy) -> Target {
        Target::new(ap.ip.to_string(), site.admin_user.clone(), policy).with_port(self.port)
    }

    async fn open_with_key(&self, ap: &AccessPoint, site: &SiteModel) -> Result<C::Channel, CoreError> {
        let policy = self.host_key_policy(ap, false)?;
        let target = self.target(ap, site, policy);
        self.connector
            .open(&target, &AuthMethod::PrivateKey(site.ssh_key.clone()))
            .await
            .map_err(|e| CoreError::remote(&ap.name, e))
    }

    /// Run one command on a fresh key-authenticated session.
    async fn apply(&self, ap: &AccessPoint, site: &SiteModel, action: &str, command: &str) -> Result<(), CoreError> {
        debug!(ap = %ap.name, action, "applying");
        let mut channel = self.open_with_key(ap, site).await?;
        let result = run_checked(&mut channel, &ap.name, action, command).await;
        channel.close().await;
        result
    }

    // ── Bootstrap ────────────────────────────────────────────────────

    /// Take a factory-fresh device to `Bootstrapped`: install the site key,
    /// rotate the admin password, then run the backend's extra steps.
    pub async fn bootstrap(
        &self,
        ap: &AccessPoint,
        site: &SiteModel,
        trust_on_first_use: bool,
    ) -> Result<Bootstrapped, CoreError> {
        let Some(password) = site.password.as_ref() else {
            return Err(CoreError::Validation {
                message: "site has no admin password to rotate onto access points".into(),
            });
        };
        let device = site.device(&ap.model)?;
        let Backend::OpenWrt(backend) = self.backend;

        let install = install_public_key(&site.ssh_public_key, backend.authorized_keys())
            .await
            .map_err(|e| CoreError::Config {
                message: format!("cannot read public key {}: {e}", site.ssh_public_key.display()),
            })?;

        let mut trust = TrustState::Untrusted;
        info!(ap = %ap.name, ip = %ap.ip, "bootstrapping access point");

        // Password session on factory credentials.
        let policy = self.host_key_policy(ap, trust_on_first_use)?;
        let target = self.target(ap, site, policy);
        let mut channel = self
            .connector
            .open(&target, &AuthMethod::Password(site.initial_password()))
            .await
            .map_err(|e| CoreError::remote(&ap.name, e))?;
        let host_key = channel.host_key_fingerprint();

        let installed = async {
            let key_dir = backend.key_dir();
            let found = run(&mut channel, &ap.name, &openwrt::dir_exists(key_dir)).await?;
            if !found.success() {
                let dir = shell_quote(key_dir);
                run_checked(
                    &mut channel,
                    &ap.name,
                    "create key directory",
                    &format!("mkdir -p {dir} && chmod 700 {dir}"),
                )
                .await?;
            }
            channel
                .run_interactive(&install)
                .await
                .map_err(|e| CoreError::remote(&ap.name, e))?;
            run_checked(
                &mut channel,
                &ap.name,
                "restrict authorized_keys",
                &format!("chmod 600 {}", shell_quote(backend.authorized_keys())),
            )
            .await
        }
        .await;
        channel.close().await;
        installed?;
        trust.advance(TrustState::KeyInstalled)?;
        debug!(ap = %ap.name, "site key installed");

        // Key session, pinned to whatever the first session saw.
        let mut pinned = ap.clone();
        if pinned.host_key.is_none() {
            pinned.host_key.clone_from(&host_key);
        }
        let mut channel = self.open_with_key(&pinned, site).await?;
        let finished = async {
            channel
                .run_interactive(&change_password(&site.admin_user, password))
                .await
                .map_err(|e| CoreError::remote(&ap.name, e))?;
            trust.advance(TrustState::PasswordRotated)?;
            debug!(ap = %ap.name, "admin password rotated");

            for action in backend.post_bootstrap(site, device) {
                run_checked(&mut channel, &ap.name, action.label, &action.command).await?;
            }
            trust.advance(TrustState::Bootstrapped)
        }
        .await;
        channel.close().await;
        finished?;

        info!(ap = %ap.name, "access point bootstrapped");
        Ok(Bootstrapped {
            trust,
            host_key: pinned.host_key,
        })
    }

    // ── Configuration pushes ─────────────────────────────────────────

    pub async fn push_ssid(&self, ap: &AccessPoint, ssid: &Ssid, site: &SiteModel) -> Result<(), CoreError> {
        let device = site.device(&ap.model)?;
        let Backend::OpenWrt(backend) = self.backend;
        let command = backend.push_ssid(site, ap, device, ssid);
        self.apply(ap, site, "push ssid", &command).await
    }

    pub async fn remove_ssid(&self, ap: &AccessPoint, ssid: &Ssid, site: &SiteModel) -> Result<(), CoreError> {
        let device = site.device(&ap.model)?;
        let Backend::OpenWrt(backend) = self.backend;
        let command = backend.remove_ssid(ap, device, ssid);
        self.apply(ap, site, "remove ssid", &command).await
    }

    /// Make `ap` list `peer` as a roaming neighbour.
    pub async fn add_neighbour(&self, ap: &AccessPoint, peer: &AccessPoint, site: &SiteModel) -> Result<(), CoreError> {
        let Backend::OpenWrt(backend) = self.backend;
        let command = backend.add_neighbour(&peer.roaming_id());
        self.apply(ap, site, "add neighbour", &command).await
    }

    pub async fn remove_neighbour(
        &self,
        ap: &AccessPoint,
        peer: &AccessPoint,
        site: &SiteModel,
    ) -> Result<(), CoreError> {
        let Backend::OpenWrt(backend) = self.backend;
        let command = backend.remove_neighbour(&peer.roaming_id());
        self.apply(ap, site, "remove neighbour", &command).await
    }

    pub async fn apply_radios(&self, ap: &AccessPoint, site: &SiteModel) -> Result<(), CoreError> {
        let device = site.device(&ap.model)?;
        let Backend::OpenWrt(backend) = self.backend;
        let command = backend.apply_radios(ap, device);
        self.apply(ap, site, "apply radios", &command).await
    }
}

async fn run<Ch: RemoteChannel>(
    channel: &mut Ch,
    ap: &str,
    command: &str,
) -> Result<wnetctl_ssh::CommandOutput, CoreError> {
    channel.run(command).await.map_err(|e| CoreError::remote(ap, e))
}

async fn run_checked<Ch: RemoteChannel>(
    channel: &mut Ch,
    ap: &str,
    action: &str,
    command: &str,
) -> Result<(), CoreError> {
    let output = run(channel, ap, command).await?;
    if output.success() {
        return Ok(());
    }
    let stderr = output.stderr.trim();
    Err(CoreError::RemoteCommand {
        ap: ap.to_owned(),
        message: if stderr.is_empty() {
            format!("{action} exited with {}", output.exit_code)
        } else {
            format!("{action} exited with {}: {stderr}", output.exit_code)
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use secrecy::SecretString;
    use wnetctl_ssh::mock::{Failure, MockConnector};

    use super::*;
    use crate::model::{DeviceType, RadioDescriptor};

    struct Fixture {
        site: SiteModel,
        ap: AccessPoint,
        _key: tempfile::NamedTempFile,
    }

    fn fixture() -> Fixture {
        let mut key = tempfile::NamedTempFile::new().unwrap();
        writeln!(key, "ssh-ed25519 AAAA site").unwrap();

        let mut site = SiteModel::new("/keys/site", key.path());
        site.password = Some(SecretString::from("n3w-admin-pw".to_string()));
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
        let ap = AccessPoint::new("hall", &site.devices["c7"], "10.0.0.2".parse().unwrap(), None);
        Fixture { site, ap, _key: key }
    }

    fn agent(mock: &MockConnector) -> AccessPointAgent<MockConnector> {
        AccessPointAgent::new(mock.clone(), Backend::from(BackendKind::OpenWrt))
    }

    #[tokio::test]
    async fn bootstrap_walks_every_trust_state() {
        let fx = fixture();
        let mock = MockConnector::new();

        let done = agent(&mock).bootstrap(&fx.ap, &fx.site, true).await.unwrap();

        assert_eq!(done.trust, TrustState::Bootstrapped);
        assert_eq!(done.host_key, Some(MockConnector::fingerprint_for("10.0.0.2")));
        assert_eq!(
            mock.sessions(),
            vec![
                ("10.0.0.2".to_owned(), "password"),
                ("10.0.0.2".to_owned(), "publickey"),
            ]
        );
        let commands = mock.commands_on("10.0.0.2");
        assert_eq!(commands[0], "test -d /etc/dropbear");
        assert_eq!(commands[1], "tee -a /etc/dropbear/authorized_keys >/dev/null");
        assert_eq!(commands[2], "chmod 600 /etc/dropbear/authorized_keys");
        assert_eq!(commands[3], "passwd root");
        assert!(commands.last().unwrap().contains("PasswordAuth='off'"));
    }

    #[tokio::test]
    async fn bootstrap_creates_missing_key_directory() {
        let fx = fixture();
        let mock = MockConnector::new();
        mock.fail("10.0.0.2", "test -d", Failure::Exit(1));

        agent(&mock).bootstrap(&fx.ap, &fx.site, true).await.unwrap();

        let commands = mock.commands_on("10.0.0.2");
        assert_eq!(commands[1], "mkdir -p /etc/dropbear && chmod 700 /etc/dropbear");
    }

    #[tokio::test]
    async fn bootstrap_requires_explicit_trust_for_unknown_host() {
        let fx = fixture();
        let mock = MockConnector::new();

        let err = agent(&mock).bootstrap(&fx.ap, &fx.site, false).await.unwrap_err();

        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(mock.sessions().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_stops_on_unexpected_passwd_prompt() {
        let fx = fixture();
        let mock = MockConnector::new();
        mock.transcript("10.0.0.2", "passwd", "Changing password for root\nOld password:");

        let err = agent(&mock).bootstrap(&fx.ap, &fx.site, true).await.unwrap_err();

        assert!(matches!(err, CoreError::ProtocolMismatch { .. }), "got {err:?}");
        assert!(!mock.commands_on("10.0.0.2").iter().any(|c| c.contains("dropbear.@dropbear")));
    }

    #[tokio::test]
    async fn bootstrap_with_refused_password_is_transport_error() {
        let fx = fixture();
        let mock = MockConnector::new();
        mock.refuse_auth("10.0.0.2", "password");

        let err = agent(&mock).bootstrap(&fx.ap, &fx.site, true).await.unwrap_err();
        assert!(matches!(err, CoreError::Transport { .. }));
    }

    #[tokio::test]
    async fn bootstrap_without_site_password_fails_before_connecting() {
        let mut fx = fixture();
        fx.site.password = None;
        let mock = MockConnector::new();

        let err = agent(&mock).bootstrap(&fx.ap, &fx.site, true).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(mock.sessions().is_empty());
    }

    #[tokio::test]
    async fn push_requires_pinned_key() {
        let fx = fixture();
        let mock = MockConnector::new();
        let ssid = Ssid::new("guest", crate::model::AuthMode::Open, None);

        let err = agent(&mock).push_ssid(&fx.ap, &ssid, &fx.site).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        let mut pinned = fx.ap.clone();
        pinned.host_key = Some(MockConnector::fingerprint_for("10.0.0.2"));
        agent(&mock).push_ssid(&pinned, &ssid, &fx.site).await.unwrap();
        assert_eq!(mock.sessions(), vec![("10.0.0.2".to_owned(), "publickey")]);
    }

    #[tokio::test]
    async fn non_zero_exit_becomes_remote_command_error() {
        let mut fx = fixture();
        fx.ap.host_key = Some(MockConnector::fingerprint_for("10.0.0.2"));
        let mock = MockConnector::new();
        mock.fail("10.0.0.2", "txpower", Failure::Exit(1));

        let err = agent(&mock).apply_radios(&fx.ap, &fx.site).await.unwrap_err();
        match err {
            CoreError::RemoteCommand { ap, message } => {
                assert_eq!(ap, "hall");
                assert!(message.starts_with("apply radios exited with 1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
