//! Device-type catalog handlers.

use serde::Serialize;
use tabled::Tabled;
use wnetctl_core::{Command as CoreCommand, DeviceType, RadioDescriptor};

use crate::cli::{DeviceAddArgs, DeviceArgs, DeviceCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceView<'a> {
    #[serde(flatten)]
    device: &'a DeviceType,
    users: usize,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Arch")]
    architecture: String,
    #[tabled(rename = "2.4 GHz")]
    wlan2: String,
    #[tabled(rename = "5 GHz")]
    wlan5: String,
    #[tabled(rename = "APs")]
    users: usize,
}

fn radio_cell(radio: Option<&RadioDescriptor>) -> String {
    radio.map_or_else(|| "-".into(), ToString::to_string)
}

impl From<&DeviceView<'_>> for DeviceRow {
    fn from(v: &DeviceView<'_>) -> Self {
        Self {
            name: v.device.name.clone(),
            model: v.device.model.clone(),
            architecture: v.device.architecture.clone(),
            wlan2: radio_cell(v.device.wlan2.as_ref()),
            wlan5: radio_cell(v.device.wlan5.as_ref()),
            users: v.users,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: DeviceArgs) -> Result<(), CliError> {
    match args.command {
        DeviceCommand::Add(add) => {
            let devices = match add.file.clone() {
                Some(path) => read_catalog(&util::read_file(&path)?)?,
                None => vec![device_from_args(add)?],
            };
            for device in devices {
                let name = device.name.clone();
                ctx.site
                    .execute(CoreCommand::AddDeviceType(device), &ctx.cancel)
                    .await?;
                output::print_done(&format!("device type '{name}' added"), ctx.quiet);
            }
            Ok(())
        }

        DeviceCommand::Remove { name } => {
            ctx.site
                .execute(CoreCommand::RemoveDeviceType { name: name.clone() }, &ctx.cancel)
                .await?;
            output::print_done(&format!("device type '{name}' removed"), ctx.quiet);
            Ok(())
        }

        DeviceCommand::List => {
            let snap = ctx.site.snapshot();
            let views: Vec<DeviceView<'_>> = snap
                .devices
                .iter()
                .map(|(name, device)| DeviceView {
                    device,
                    users: snap.users_of(name).count(),
                })
                .collect();
            let out = output::render_list(ctx.output, &views, |v| DeviceRow::from(v), |v| v.device.name.clone())?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
    }
}

fn device_from_args(add: DeviceAddArgs) -> Result<DeviceType, CliError> {
    let (Some(name), Some(model)) = (add.name, add.model) else {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: "a name and --model are required without --file".into(),
        });
    };
    let wlan2 = add.wlan2.as_deref().map(|raw| util::parse_radio("wlan2", raw)).transpose()?;
    let wlan5 = add.wlan5.as_deref().map(|raw| util::parse_radio("wlan5", raw)).transpose()?;
    Ok(DeviceType {
        name,
        model,
        cpu: add.cpu,
        architecture: add.architecture,
        wlan2,
        wlan5,
        bridged_wired_device: add.bridged,
    })
}

/// A YAML sequence of device types, as found under `devices:` in a
/// site document.
fn read_catalog(text: &str) -> Result<Vec<DeviceType>, CliError> {
    Ok(serde_yaml::from_str(text)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_a_sequence_of_records() {
        let devices = read_catalog(
            r"
- name: c7
  model: Archer C7
  wlan2: { device: radio1, interface: wlan1 }
  wlan5: { device: radio0, interface: wlan0, driver: ath10k }
- name: wr841
  model: TL-WR841N
  wlan2: { device: radio0, interface: wlan0 }
",
        )
        .unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "c7");
        assert_eq!(devices[0].wlan5.as_ref().unwrap().driver, "ath10k");
        assert_eq!(devices[1].name, "wr841");
        assert!(devices[1].wlan5.is_none());
    }
}
