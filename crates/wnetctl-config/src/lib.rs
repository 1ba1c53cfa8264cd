//! Site registry for wnetctl.
//!
//! A TOML file maps site names to their YAML documents plus per-site
//! connection settings. The CLI resolves one site per invocation from
//! `--site`, then `default_site`, and builds a `SiteHandle` from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wnetctl_core::{BackendKind, YamlStore};

/// Overrides the registry file location.
pub const CONFIG_ENV: &str = "WNETCTL_CONFIG_FILE";
/// Overrides where new site documents are created.
pub const DATA_DIR_ENV: &str = "WNETCTL_DATA_DIR";
/// Admin password for `site init` without prompting.
pub const ADMIN_PASSWORD_ENV: &str = "WNETCTL_ADMIN_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no site selected; pass --site or run `wnetctl site select <name>`")]
    NoSiteSelected,

    #[error("unknown site '{name}'")]
    UnknownSite { name: String },

    #[error("site '{name}' is already registered")]
    SiteExists { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level registry file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Site used when `--site` is absent.
    pub default_site: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub sites: BTreeMap<String, SiteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// `table`, `json` or `yaml`.
    #[serde(default = "default_output")]
    pub output: String,

    /// Seconds per remote command.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to establish an SSH session.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            port: default_port(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_port() -> u16 {
    wnetctl_core::agent::DEFAULT_PORT
}

/// One registered site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SiteEntry {
    /// The site's YAML document.
    pub path: PathBuf,

    pub description: Option<String>,

    #[serde(default)]
    pub backend: BackendKind,

    /// Verify access point host keys against this file instead of
    /// fingerprints pinned in the site document.
    pub known_hosts: Option<PathBuf>,

    /// Override the default SSH port.
    pub port: Option<u16>,

    /// Override the default command timeout.
    pub timeout: Option<u64>,
}

impl SiteEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            description: None,
            backend: BackendKind::default(),
            known_hosts: None,
            port: None,
            timeout: None,
        }
    }
}

/// A site entry with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSite {
    pub name: String,
    pub path: PathBuf,
    pub backend: BackendKind,
    pub known_hosts: Option<PathBuf>,
    pub port: u16,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl ResolvedSite {
    pub fn store(&self) -> YamlStore {
        YamlStore::new(&self.path)
    }
}

// ── Registry operations ─────────────────────────────────────────────

impl Config {
    /// The selected default site.
    pub fn current_site(&self) -> Result<ResolvedSite, ConfigError> {
        let name = self
            .default_site
            .as_deref()
            .ok_or(ConfigError::NoSiteSelected)?;
        self.resolve(name)
    }

    /// Look up `name` and fill in defaults.
    pub fn resolve(&self, name: &str) -> Result<ResolvedSite, ConfigError> {
        let entry = self.sites.get(name).ok_or_else(|| ConfigError::UnknownSite {
            name: name.to_owned(),
        })?;
        Ok(ResolvedSite {
            name: name.to_owned(),
            path: entry.path.clone(),
            backend: entry.backend,
            known_hosts: entry.known_hosts.clone(),
            port: entry.port.unwrap_or(self.defaults.port),
            timeout: Duration::from_secs(entry.timeout.unwrap_or(self.defaults.timeout)),
            connect_timeout: Duration::from_secs(self.defaults.connect_timeout),
        })
    }

    /// `--site` when given, otherwise the default site.
    pub fn resolve_or_current(&self, name: Option<&str>) -> Result<ResolvedSite, ConfigError> {
        match name {
            Some(name) => self.resolve(name),
            None => self.current_site(),
        }
    }

    /// Register a site. The first site registered becomes the default.
    pub fn add_site(&mut self, name: &str, entry: SiteEntry) -> Result<(), ConfigError> {
        validate_site_name(name)?;
        if self.sites.contains_key(name) {
            return Err(ConfigError::SiteExists { name: name.to_owned() });
        }
        self.sites.insert(name.to_owned(), entry);
        if self.default_site.is_none() {
            self.default_site = Some(name.to_owned());
        }
        Ok(())
    }

    pub fn select(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.sites.contains_key(name) {
            return Err(ConfigError::UnknownSite { name: name.to_owned() });
        }
        self.default_site = Some(name.to_owned());
        Ok(())
    }

    /// Unregister a site. Its document is left on disk.
    pub fn remove(&mut self, name: &str) -> Result<SiteEntry, ConfigError> {
        let entry = self.sites.remove(name).ok_or_else(|| ConfigError::UnknownSite {
            name: name.to_owned(),
        })?;
        if self.default_site.as_deref() == Some(name) {
            self.default_site = None;
        }
        Ok(entry)
    }
}

fn validate_site_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            field: "site name".into(),
            reason: format!("'{name}' may only contain letters, digits, '-', '_' and '.'"),
        })
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "wnetctl", "wnetctl")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.extend(parts);
    p
}

/// Resolve the registry file via `WNETCTL_CONFIG_FILE` or platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || home_fallback(&[".config", "wnetctl", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding site documents created by `site init`.
pub fn data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "wnetctl"]),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

/// A fresh, collision-free document path under `data_dir`.
pub fn new_site_path(data_dir: &Path) -> PathBuf {
    data_dir
        .join("sites")
        .join(format!("{}.yml", uuid::Uuid::new_v4()))
}

/// Admin password from the environment, if set and non-empty.
pub fn admin_password_from_env() -> Option<SecretString> {
    std::env::var(ADMIN_PASSWORD_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the registry from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the file at `path` (if present), then `WNETCTL_*`
/// variables (`WNETCTL_DEFAULT_SITE`, `WNETCTL_DEFAULTS__TIMEOUT`, ...).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WNETCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize the registry to TOML at the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn registry() -> Config {
        let mut cfg = Config::default();
        cfg.add_site("home", SiteEntry::new("/sites/home.yml")).unwrap();
        let mut office = SiteEntry::new("/sites/office.yml");
        office.port = Some(2222);
        office.timeout = Some(5);
        cfg.add_site("office", office).unwrap();
        cfg
    }

    #[test]
    fn first_site_becomes_default() {
        let cfg = registry();
        assert_eq!(cfg.default_site.as_deref(), Some("home"));
        assert_eq!(cfg.current_site().unwrap().name, "home");
    }

    #[test]
    fn resolve_applies_defaults_and_overrides() {
        let cfg = registry();

        let home = cfg.resolve("home").unwrap();
        assert_eq!(home.port, 22);
        assert_eq!(home.timeout, Duration::from_secs(60));
        assert_eq!(home.connect_timeout, Duration::from_secs(10));

        let office = cfg.resolve_or_current(Some("office")).unwrap();
        assert_eq!(office.port, 2222);
        assert_eq!(office.timeout, Duration::from_secs(5));
        assert_eq!(office.store().path(), Path::new("/sites/office.yml"));
    }

    #[test]
    fn registry_rejects_duplicates_and_unknown_names() {
        let mut cfg = registry();
        assert!(matches!(
            cfg.add_site("home", SiteEntry::new("/x.yml")),
            Err(ConfigError::SiteExists { .. })
        ));
        assert!(matches!(cfg.select("ghost"), Err(ConfigError::UnknownSite { .. })));
        assert!(matches!(cfg.resolve("ghost"), Err(ConfigError::UnknownSite { .. })));
        assert!(matches!(
            cfg.add_site("bad name", SiteEntry::new("/x.yml")),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn removing_default_site_clears_selection() {
        let mut cfg = registry();
        cfg.select("office").unwrap();
        cfg.remove("office").unwrap();

        assert_eq!(cfg.default_site, None);
        assert!(matches!(cfg.current_site(), Err(ConfigError::NoSiteSelected)));
        assert_eq!(cfg.sites.len(), 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = registry();
        cfg.sites.get_mut("home").unwrap().description = Some("the house".into());

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.sites, cfg.sites);
        assert_eq!(loaded.defaults, Defaults::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.sites.is_empty());
        assert_eq!(cfg.defaults.output, "table");
    }

    #[test]
    fn new_site_paths_are_unique_yaml_files() {
        let base = Path::new("/data");
        let a = new_site_path(base);
        let b = new_site_path(base);
        assert_ne!(a, b);
        assert!(a.starts_with("/data/sites"));
        assert_eq!(a.extension().unwrap(), "yml");
    }
}
