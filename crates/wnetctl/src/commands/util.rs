//! Shared helpers for command handlers.

use std::borrow::Cow;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use wnetctl_config::Config;
use wnetctl_core::{AuthMode, Band, MacAddress, RadioDescriptor};

use crate::cli::{AuthArg, BandArg, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// `--output`, else the registry default, else table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global
        .output
        .or_else(|| OutputFormat::from_str(&cfg.defaults.output, true).ok())
        .unwrap_or(OutputFormat::Table)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Prompt twice for a new secret and require both entries to match.
pub fn prompt_new_secret(label: &str) -> Result<SecretString, CliError> {
    if !io::stdin().is_terminal() {
        return Err(CliError::Validation {
            field: label.into(),
            reason: "not given and stdin is not a terminal".into(),
        });
    }
    let first = rpassword::prompt_password(format!("{label}: ")).map_err(prompt_err)?;
    let second = rpassword::prompt_password(format!("Repeat {}: ", label.to_lowercase()))
        .map_err(prompt_err)?;
    if first != second {
        return Err(CliError::Validation {
            field: label.into(),
            reason: "entries do not match".into(),
        });
    }
    Ok(SecretString::from(first))
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Run `fut` under a spinner on interactive terminals.
pub async fn with_spinner<T>(
    message: impl Into<Cow<'static, str>>,
    quiet: bool,
    fut: impl Future<Output = T>,
) -> T {
    let bar = if quiet || !io::stderr().is_terminal() {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    };
    bar.set_message(message);
    let out = fut.await;
    bar.finish_and_clear();
    out
}

pub fn parse_mac(raw: &str) -> Result<MacAddress, CliError> {
    Ok(MacAddress::parse(raw)?)
}

/// Parse `DEVICE:INTERFACE[:DRIVER]`.
pub fn parse_radio(flag: &str, raw: &str) -> Result<RadioDescriptor, CliError> {
    let mut parts = raw.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(device), Some(interface), driver, None) if !device.is_empty() && !interface.is_empty() => {
            Ok(RadioDescriptor {
                device: device.into(),
                interface: interface.into(),
                driver: driver.unwrap_or_default().into(),
            })
        }
        _ => Err(CliError::Validation {
            field: flag.into(),
            reason: format!("expected DEVICE:INTERFACE[:DRIVER], got '{raw}'"),
        }),
    }
}

pub fn read_file(path: &Path) -> Result<String, CliError> {
    Ok(std::fs::read_to_string(path)?)
}

pub fn band(arg: BandArg) -> Band {
    match arg {
        BandArg::TwoGhz => Band::TwoGhz,
        BandArg::FiveGhz => Band::FiveGhz,
    }
}

pub fn auth_mode(arg: AuthArg) -> AuthMode {
    match arg {
        AuthArg::Open => AuthMode::Open,
        AuthArg::Psk2 => AuthMode::Psk2,
        AuthArg::Sae => AuthMode::Sae,
        AuthArg::SaeMixed => AuthMode::SaeMixed,
    }
}

pub fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn radio_spec_with_and_without_driver() {
        let radio = parse_radio("wlan2", "radio0:wlan0:ath9k").unwrap();
        assert_eq!(radio.device, "radio0");
        assert_eq!(radio.driver, "ath9k");

        let radio = parse_radio("wlan5", "radio1:wlan1").unwrap();
        assert_eq!(radio.interface, "wlan1");
        assert!(radio.driver.is_empty());

        assert!(parse_radio("wlan5", "radio1").is_err());
        assert!(parse_radio("wlan5", "a:b:c:d").is_err());
        assert!(parse_radio("wlan5", ":wlan1").is_err());
    }
}
