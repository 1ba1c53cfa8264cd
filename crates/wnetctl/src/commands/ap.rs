//! Access point handlers.

use tabled::Tabled;
use wnetctl_core::{
    AccessPoint, AddAccessPointRequest, Band, Command as CoreCommand, CommandResult,
    TuneRadioRequest,
};

use crate::cli::{ApArgs, ApCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

// ── Views ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ApRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Trust")]
    trust: String,
    #[tabled(rename = "2.4 GHz")]
    wlan2: String,
    #[tabled(rename = "5 GHz")]
    wlan5: String,
    #[tabled(rename = "Neighbours")]
    neighbours: usize,
}

fn radio_cell(ap: &AccessPoint, band: Band) -> String {
    match ap.radio(band) {
        None => "-".into(),
        Some(radio) => match radio.power {
            Some(power) => format!("ch {} / {power} dBm", radio.channel),
            None => format!("ch {}", radio.channel),
        },
    }
}

impl From<&AccessPoint> for ApRow {
    fn from(ap: &AccessPoint) -> Self {
        Self {
            name: ap.name.clone(),
            model: ap.model.clone(),
            ip: ap.ip.to_string(),
            mac: ap.mac.as_ref().map_or_else(|| "-".into(), ToString::to_string),
            trust: ap.trust.to_string(),
            wlan2: radio_cell(ap, Band::TwoGhz),
            wlan5: radio_cell(ap, Band::FiveGhz),
            neighbours: ap.neighbours.len(),
        }
    }
}

fn detail(ap: &AccessPoint) -> String {
    [
        format!("Name:       {}", ap.name),
        format!("Model:      {}", ap.model),
        format!("IP:         {}", ap.ip),
        format!("MAC:        {}", ap.mac.as_ref().map_or_else(|| "-".into(), ToString::to_string)),
        format!("Trust:      {}", ap.trust),
        format!("Host key:   {}", ap.host_key.as_deref().unwrap_or("-")),
        format!("2.4 GHz:    {}", radio_cell(ap, Band::TwoGhz)),
        format!("5 GHz:      {}", radio_cell(ap, Band::FiveGhz)),
        format!(
            "Neighbours: {}",
            if ap.neighbours.is_empty() { "-".into() } else { ap.neighbours.join(", ") }
        ),
    ]
    .join("\n")
}

fn print_access_point(ctx: &Context, result: CommandResult) -> Result<(), CliError> {
    if let CommandResult::AccessPoint(ap) = result {
        let out = output::render_single(ctx.output, &*ap, detail, |ap| ap.name.clone())?;
        output::print_output(&out, ctx.quiet);
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: ApArgs) -> Result<(), CliError> {
    match args.command {
        ApCommand::Add {
            name,
            model,
            ip,
            mac,
            trust_on_first_use,
        } => {
            let mac = mac.as_deref().map(util::parse_mac).transpose()?;
            let request = AddAccessPointRequest {
                name: name.clone(),
                model,
                ip,
                mac,
                trust_on_first_use,
            };
            let result = util::with_spinner(
                format!("Bootstrapping {name} at {ip}"),
                ctx.quiet,
                ctx.site.execute(CoreCommand::AddAccessPoint(request), &ctx.cancel),
            )
            .await?;
            print_access_point(ctx, result)
        }

        ApCommand::Remove { name } => {
            if !util::confirm(&format!("Remove access point '{name}'?"), "ap remove", ctx.yes)? {
                return Ok(());
            }
            util::with_spinner(
                format!("Unlinking {name} from its peers"),
                ctx.quiet,
                ctx.site
                    .execute(CoreCommand::RemoveAccessPoint { name: name.clone() }, &ctx.cancel),
            )
            .await?;
            output::print_done(&format!("access point '{name}' removed"), ctx.quiet);
            Ok(())
        }

        ApCommand::List => {
            let snap = ctx.site.snapshot();
            let aps: Vec<AccessPoint> = snap.access_points.values().cloned().collect();
            let out = output::render_list(ctx.output, &aps, |ap| ApRow::from(ap), |ap| ap.name.clone())?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        ApCommand::Tune {
            name,
            band,
            channel,
            power,
            default_power,
        } => {
            let power = if default_power { Some(None) } else { power.map(Some) };
            if channel.is_none() && power.is_none() {
                return Err(CliError::Validation {
                    field: "tune".into(),
                    reason: "give --channel, --power or --default-power".into(),
                });
            }
            let request = TuneRadioRequest {
                name: name.clone(),
                band: util::band(band),
                channel,
                power,
            };
            let result = util::with_spinner(
                format!("Tuning {name}"),
                ctx.quiet,
                ctx.site.execute(CoreCommand::TuneAccessPoint(request), &ctx.cancel),
            )
            .await?;
            print_access_point(ctx, result)
        }
    }
}
