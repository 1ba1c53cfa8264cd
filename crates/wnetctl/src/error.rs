//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and a stable exit code per class.

use miette::Diagnostic;
use thiserror::Error;

use wnetctl_config::ConfigError;
use wnetctl_core::{CoreError, StoreError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const REMOTE: i32 = 9;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Access points ────────────────────────────────────────────────
    #[error("Could not reach access point {ap}")]
    #[diagnostic(
        code(wnetctl::connection_failed),
        help(
            "Check that {ap} is powered, reachable over SSH, and that its host key\n\
             matches the one pinned in the site document."
        )
    )]
    ConnectionFailed {
        ap: String,
        #[source]
        source: wnetctl_ssh::Error,
    },

    #[error("Access point {ap} did not answer in time")]
    #[diagnostic(
        code(wnetctl::timeout),
        help("Increase the limit with --timeout or --connect-timeout.")
    )]
    Timeout {
        ap: String,
        #[source]
        source: wnetctl_ssh::Error,
    },

    #[error("Access point {ap} answered unexpectedly")]
    #[diagnostic(
        code(wnetctl::protocol_mismatch),
        help(
            "The device's prompts differ from what bootstrap expects.\n\
             Check that it runs OpenWrt with dropbear and a factory admin password."
        )
    )]
    ProtocolMismatch {
        ap: String,
        #[source]
        source: wnetctl_ssh::Error,
    },

    #[error("Command failed on access point {ap}: {message}")]
    #[diagnostic(code(wnetctl::remote_command))]
    RemoteCommand { ap: String, message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(wnetctl::not_found),
        help("Run: wnetctl {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(wnetctl::already_exists))]
    AlreadyExists {
        resource_type: String,
        identifier: String,
    },

    #[error("{message}")]
    #[diagnostic(code(wnetctl::conflict))]
    Conflict { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wnetctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No site selected")]
    #[diagnostic(
        code(wnetctl::no_site),
        help(
            "Pass --site <name>, or create one with: wnetctl site init <name> --key <path>\n\
             Registry: {path}"
        )
    )]
    NoSiteSelected { path: String },

    #[error("Cannot load or save the site registry")]
    #[diagnostic(code(wnetctl::config))]
    Config(#[source] ConfigError),

    #[error("Site changed in memory but could not be saved")]
    #[diagnostic(
        code(wnetctl::persistence),
        help("The access points already carry the change. Fix the file and retry.")
    )]
    Persistence(#[source] StoreError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(wnetctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Interrupted")]
    #[diagnostic(
        code(wnetctl::cancelled),
        help("Changes already made were undone where possible; see warnings above.")
    )]
    Cancelled,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    #[diagnostic(code(wnetctl::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::ProtocolMismatch { .. } | Self::RemoteCommand { .. } => exit_code::REMOTE,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::NoSiteSelected { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Cancelled => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

fn list_command(entity_type: &str) -> &'static str {
    match entity_type {
        "access point" => "ap list",
        "SSID" => "ssid list",
        "device type" => "device list",
        "station" => "station list <ssid>",
        _ => "site show",
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                resource_type: entity_type.into(),
                identifier,
                list_command: list_command(entity_type).into(),
            },

            CoreError::AlreadyExists {
                entity_type,
                identifier,
            } => Self::AlreadyExists {
                resource_type: entity_type.into(),
                identifier,
            },

            CoreError::Conflict { message } => Self::Conflict { message },

            CoreError::Transport {
                ap,
                source: source @ wnetctl_ssh::Error::Timeout { .. },
            } => Self::Timeout { ap, source },

            CoreError::Transport { ap, source } => Self::ConnectionFailed { ap, source },

            CoreError::ProtocolMismatch { ap, source } => Self::ProtocolMismatch { ap, source },

            CoreError::RemoteCommand { ap, message } => Self::RemoteCommand { ap, message },

            CoreError::Persistence(source) => Self::Persistence(source),

            CoreError::Cancelled => Self::Cancelled,

            CoreError::Config { message } => Self::Validation {
                field: "site".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoSiteSelected => Self::NoSiteSelected {
                path: wnetctl_config::config_path().display().to_string(),
            },
            ConfigError::UnknownSite { name } => Self::NotFound {
                resource_type: "site".into(),
                identifier: name,
                list_command: "site list".into(),
            },
            ConfigError::SiteExists { name } => Self::AlreadyExists {
                resource_type: "site".into(),
                identifier: name,
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        CoreError::from(err).into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_get_distinct_exit_codes() {
        let timeout = CliError::from(CoreError::Transport {
            ap: "ap1".into(),
            source: wnetctl_ssh::Error::Timeout {
                address: "10.0.0.1:22".into(),
                timeout_secs: 10,
            },
        });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let refused = CliError::from(CoreError::Transport {
            ap: "ap1".into(),
            source: wnetctl_ssh::Error::Transport("connection reset".into()),
        });
        assert_eq!(refused.exit_code(), exit_code::CONNECTION);

        let failed = CliError::from(CoreError::RemoteCommand {
            ap: "ap1".into(),
            message: "exited with 1".into(),
        });
        assert_eq!(failed.exit_code(), exit_code::REMOTE);
    }

    #[test]
    fn lookup_errors_point_at_list_commands() {
        let err = CliError::from(CoreError::NotFound {
            entity_type: "access point",
            identifier: "hall".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        match err {
            CliError::NotFound { list_command, .. } => assert_eq!(list_command, "ap list"),
            other => panic!("unexpected {other:?}"),
        }

        let conflict = CliError::from(CoreError::Conflict {
            message: "in use".into(),
        });
        assert_eq!(conflict.exit_code(), exit_code::CONFLICT);
        assert_eq!(CliError::from(ConfigError::NoSiteSelected).exit_code(), exit_code::USAGE);
    }
}
