// ── russh-backed sessions ──
//
// One `SshChannel` wraps one authenticated russh client handle. Each
// command gets its own exec channel on that connection. Every network
// wait is bounded: connect and authentication by `connect_timeout`, each
// command (including a whole interactive script) by `command_timeout`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use russh::client::{self, Handle, Msg};
use russh::keys::ssh_key::PublicKey;
use russh::keys::{HashAlg, PrivateKeyWithHashAlg};
use russh::{Channel, ChannelMsg, Disconnect};
use secrecy::ExposeSecret;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::auth::{AuthMethod, HostKeyPolicy, Target};
use crate::channel::{CommandOutput, Connector, RemoteChannel};
use crate::error::Error;
use crate::script::{ExitReport, InteractiveScript, ScriptIo};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// SSH extended-data stream number for stderr.
const STDERR_STREAM: u32 = 1;

// ── Connector ────────────────────────────────────────────────────────

/// Opens russh sessions with bounded connect and command time.
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<client::Config>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshConnector {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(command_timeout + connect_timeout),
            ..client::Config::default()
        };
        Self {
            config: Arc::new(config),
            connect_timeout,
            command_timeout,
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_COMMAND_TIMEOUT)
    }
}

impl Connector for SshConnector {
    type Channel = SshChannel;

    async fn open(&self, target: &Target, auth: &AuthMethod) -> Result<SshChannel, Error> {
        let address = format!("{}:{}", target.host, target.port);
        let observed = Arc::new(OnceLock::new());
        let handler = HostKeyCheck {
            host: target.host.clone(),
            port: target.port,
            policy: target.host_key.clone(),
            observed: Arc::clone(&observed),
        };

        debug!(%target, method = auth.label(), "opening ssh session");
        let connect = client::connect(
            Arc::clone(&self.config),
            (target.host.as_str(), target.port),
            handler,
        );
        let mut handle = match timeout(self.connect_timeout, connect).await {
            Err(_) => {
                return Err(Error::Timeout {
                    address,
                    timeout_secs: self.connect_timeout.as_secs(),
                });
            }
            Ok(Err(russh::Error::UnknownKey)) => {
                return Err(Error::HostKeyRejected {
                    address,
                    fingerprint: observed.get().cloned().unwrap_or_default(),
                });
            }
            Ok(Err(err)) => {
                return Err(Error::Connect {
                    address,
                    reason: err.to_string(),
                });
            }
            Ok(Ok(handle)) => handle,
        };

        let accepted = timeout(
            self.connect_timeout,
            authenticate(&mut handle, &target.username, auth),
        )
        .await
        .map_err(|_| Error::Timeout {
            address: address.clone(),
            timeout_secs: self.connect_timeout.as_secs(),
        })??;

        if !accepted {
            return Err(Error::Authentication {
                user: target.username.clone(),
                method: auth.label(),
            });
        }

        debug!(%target, "ssh session authenticated");
        Ok(SshChannel {
            handle,
            address,
            command_timeout: self.command_timeout,
            fingerprint: observed,
        })
    }
}

async fn authenticate(
    handle: &mut Handle<HostKeyCheck>,
    user: &str,
    auth: &AuthMethod,
) -> Result<bool, Error> {
    match auth {
        AuthMethod::Password(password) => {
            let result = handle
                .authenticate_password(user, password.expose_secret())
                .await?;
            Ok(result.success())
        }
        AuthMethod::PrivateKey(path) => {
            let key = russh::keys::load_secret_key(path, None).map_err(|err| Error::Key {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
            let hash = if key.algorithm().is_rsa() {
                Some(HashAlg::Sha256)
            } else {
                None
            };
            let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash);
            let result = handle.authenticate_publickey(user, key).await?;
            Ok(result.success())
        }
    }
}

// ── Host key verification ────────────────────────────────────────────

struct HostKeyCheck {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    observed: Arc<OnceLock<String>>,
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(&mut self, key: &PublicKey) -> Result<bool, Self::Error> {
        let fingerprint = key.fingerprint(HashAlg::Sha256).to_string();
        let _ = self.observed.set(fingerprint.clone());

        let accepted = match &self.policy {
            HostKeyPolicy::Fingerprint(pinned) => *pinned == fingerprint,
            HostKeyPolicy::KnownHosts(path) => {
                match russh::keys::check_known_hosts_path(&self.host, self.port, key, path) {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(host = %self.host, error = %err, "known_hosts check failed");
                        false
                    }
                }
            }
            HostKeyPolicy::TrustOnFirstUse => {
                info!(host = %self.host, %fingerprint, "trusting host key on first use");
                true
            }
        };

        if !accepted {
            warn!(host = %self.host, %fingerprint, "host key rejected");
        }
        Ok(accepted)
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// An authenticated russh session.
pub struct SshChannel {
    handle: Handle<HostKeyCheck>,
    address: String,
    command_timeout: Duration,
    fingerprint: Arc<OnceLock<String>>,
}

impl SshChannel {
    fn timed_out(&self) -> Error {
        Error::Timeout {
            address: self.address.clone(),
            timeout_secs: self.command_timeout.as_secs(),
        }
    }

    async fn exec(&self, command: &str) -> Result<Channel<Msg>, Error> {
        let channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;
        Ok(channel)
    }

    async fn collect(&self, command: &str) -> Result<CommandOutput, Error> {
        let mut channel = self.exec(command).await?;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data);
                }
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                _ => {}
            }
        }

        let exit_code = exit_code.ok_or_else(|| {
            Error::Transport(format!("{}: channel closed without exit status", self.address))
        })?;
        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    async fn script(&self, script: &InteractiveScript) -> Result<(), Error> {
        let channel = self.exec(script.command()).await?;
        let mut io = ExecIo::new(channel, &self.address);
        script.drive(&mut io).await
    }
}

impl RemoteChannel for SshChannel {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, Error> {
        match timeout(self.command_timeout, self.collect(command)).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out()),
        }
    }

    async fn run_interactive(&mut self, script: &InteractiveScript) -> Result<(), Error> {
        match timeout(self.command_timeout, self.script(script)).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out()),
        }
    }

    fn host_key_fingerprint(&self) -> Option<String> {
        self.fingerprint.get().cloned()
    }

    async fn close(self) {
        if let Err(err) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(address = %self.address, error = %err, "disconnect failed");
        }
    }
}

// ── Script IO over an exec channel ───────────────────────────────────

struct ExecIo<'a> {
    channel: Channel<Msg>,
    address: &'a str,
    pending: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<u32>,
    stdout_closed: bool,
}

impl<'a> ExecIo<'a> {
    fn new(channel: Channel<Msg>, address: &'a str) -> Self {
        Self {
            channel,
            address,
            pending: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
            stdout_closed: false,
        }
    }

    /// Pull one message off the channel. Returns `false` once it is closed.
    async fn pump(&mut self) -> bool {
        match self.channel.wait().await {
            Some(ChannelMsg::Data { ref data }) => self.pending.extend_from_slice(data),
            Some(ChannelMsg::ExtendedData { ref data, ext }) if ext == STDERR_STREAM => {
                self.stderr.extend_from_slice(data);
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => self.exit_code = Some(exit_status),
            Some(ChannelMsg::Eof) => self.stdout_closed = true,
            Some(_) => {}
            None => {
                self.stdout_closed = true;
                return false;
            }
        }
        true
    }
}

impl ScriptIo for ExecIo<'_> {
    async fn read_until(&mut self, delimiter: u8) -> Result<Vec<u8>, Error> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == delimiter) {
                return Ok(self.pending.drain(..=pos).collect());
            }
            if self.stdout_closed || !self.pump().await {
                return Ok(std::mem::take(&mut self.pending));
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), Error> {
        self.channel.data(data).await?;
        Ok(())
    }

    async fn close_input(&mut self) -> Result<(), Error> {
        self.channel.eof().await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<ExitReport, Error> {
        while self.pump().await {}
        let exit_code = self.exit_code.ok_or_else(|| {
            Error::Transport(format!("{}: channel closed without exit status", self.address))
        })?;
        Ok(ExitReport {
            exit_code,
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}
