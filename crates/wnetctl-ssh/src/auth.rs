use std::fmt;
use std::path::PathBuf;

use secrecy::SecretString;

/// Default SSH port on access points.
pub const DEFAULT_PORT: u16 = 22;

/// Credentials offered when opening a session.
///
/// Fresh devices only accept passwords; once the site key is installed,
/// every later session authenticates with the private key.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Password authentication (bootstrap only).
    Password(SecretString),
    /// Private key loaded from an OpenSSH key file.
    PrivateKey(PathBuf),
}

impl AuthMethod {
    /// Short label used in logs and errors. Never includes secret material.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PrivateKey(_) => "publickey",
        }
    }
}

/// How the server's host key is verified.
///
/// There is deliberately no "accept anything" variant: trust on first use
/// must be requested explicitly and the observed key is pinned afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept only a key with this SHA-256 fingerprint (`SHA256:...`).
    Fingerprint(String),
    /// Look the host up in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
    /// Accept an unknown key once; the caller must pin what was observed.
    TrustOnFirstUse,
}

/// Where to connect and as whom.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub host_key: HostKeyPolicy,
}

impl Target {
    pub fn new(host: impl Into<String>, username: impl Into<String>, host_key: HostKeyPolicy) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            host_key,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}
