//! SSID handlers.

use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;
use wnetctl_core::{AuthMode, Command as CoreCommand, Ssid, Station};

use crate::cli::{SsidArgs, SsidCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

// ── Views ───────────────────────────────────────────────────────────

/// Everything but the passphrase.
#[derive(Serialize)]
struct SsidView<'a> {
    name: &'a str,
    auth: AuthMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    vlan: Option<u16>,
    restricted: bool,
    whitelisted: bool,
    stations: &'a [Station],
}

impl<'a> From<&'a Ssid> for SsidView<'a> {
    fn from(s: &'a Ssid) -> Self {
        Self {
            name: &s.name,
            auth: s.auth,
            vlan: s.vlan,
            restricted: s.restricted,
            whitelisted: s.whitelisted,
            stations: &s.stations,
        }
    }
}

#[derive(Tabled)]
struct SsidRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "VLAN")]
    vlan: String,
    #[tabled(rename = "Isolated")]
    restricted: String,
    #[tabled(rename = "Allow-list")]
    whitelisted: String,
    #[tabled(rename = "Stations")]
    stations: usize,
}

impl From<&SsidView<'_>> for SsidRow {
    fn from(v: &SsidView<'_>) -> Self {
        Self {
            name: v.name.into(),
            auth: v.auth.to_string(),
            vlan: v.vlan.map_or_else(|| "-".into(), |id| id.to_string()),
            restricted: util::yes_no(v.restricted),
            whitelisted: util::yes_no(v.whitelisted),
            stations: v.stations.len(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: SsidArgs) -> Result<(), CliError> {
    match args.command {
        SsidCommand::Add {
            name,
            auth,
            password,
            vlan,
            restricted,
            whitelisted,
        } => {
            let auth = util::auth_mode(auth);
            let password = match password {
                Some(value) => Some(SecretString::from(value)),
                None if auth.requires_secret() => Some(util::prompt_new_secret("Passphrase")?),
                None => None,
            };
            let mut ssid = Ssid::new(name.clone(), auth, password);
            ssid.vlan = vlan;
            ssid.restricted = restricted;
            ssid.whitelisted = whitelisted;

            let aps = ctx.site.snapshot().access_points.len();
            util::with_spinner(
                format!("Adding {name} to {aps} access point(s)"),
                ctx.quiet,
                ctx.site.execute(CoreCommand::AddSsid(ssid), &ctx.cancel),
            )
            .await?;
            output::print_done(&format!("SSID '{name}' added"), ctx.quiet);
            Ok(())
        }

        SsidCommand::Remove { name } => {
            if !util::confirm(&format!("Remove SSID '{name}' from every access point?"), "ssid remove", ctx.yes)? {
                return Ok(());
            }
            util::with_spinner(
                format!("Removing {name}"),
                ctx.quiet,
                ctx.site
                    .execute(CoreCommand::RemoveSsid { name: name.clone() }, &ctx.cancel),
            )
            .await?;
            output::print_done(&format!("SSID '{name}' removed"), ctx.quiet);
            Ok(())
        }

        SsidCommand::List => {
            let snap = ctx.site.snapshot();
            let views: Vec<SsidView<'_>> = snap.ssids.iter().map(SsidView::from).collect();
            let out = output::render_list(ctx.output, &views, |v| SsidRow::from(v), |v| v.name.into())?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        SsidCommand::Push { name } => {
            let ssid = ctx.site.snapshot().ssid(&name)?.clone();
            util::with_spinner(
                format!("Pushing {name}"),
                ctx.quiet,
                ctx.site.execute(CoreCommand::UpdateSsid(ssid), &ctx.cancel),
            )
            .await?;
            output::print_done(&format!("SSID '{name}' pushed"), ctx.quiet);
            Ok(())
        }
    }
}
