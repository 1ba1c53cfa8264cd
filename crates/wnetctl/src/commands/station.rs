//! Station allow-list handlers. Changes are stored only; `ssid push`
//! applies them.

use tabled::Tabled;
use wnetctl_core::{Command as CoreCommand, Station};

use crate::cli::{StationArgs, StationCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

#[derive(Tabled)]
struct StationRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Comment")]
    comment: String,
}

impl From<&Station> for StationRow {
    fn from(s: &Station) -> Self {
        Self {
            mac: s.mac.to_string(),
            name: s.name.clone(),
            comment: s.comment.clone(),
        }
    }
}

fn push_hint(ssid: &str, quiet: bool) {
    if !quiet {
        eprintln!("run `wnetctl ssid push {ssid}` to apply it to the access points");
    }
}

pub async fn handle(ctx: &Context, args: StationArgs) -> Result<(), CliError> {
    match args.command {
        StationCommand::Add {
            ssid,
            mac,
            name,
            comment,
        } => {
            let station = Station {
                mac: util::parse_mac(&mac)?,
                name,
                comment,
            };
            let mac = station.mac.to_string();
            ctx.site
                .execute(
                    CoreCommand::AddStation {
                        ssid: ssid.clone(),
                        station,
                    },
                    &ctx.cancel,
                )
                .await?;
            output::print_done(&format!("station {mac} stored on '{ssid}'"), ctx.quiet);
            push_hint(&ssid, ctx.quiet);
            Ok(())
        }

        StationCommand::Remove { ssid, mac } => {
            let mac = util::parse_mac(&mac)?;
            ctx.site
                .execute(
                    CoreCommand::RemoveStation {
                        ssid: ssid.clone(),
                        mac: mac.clone(),
                    },
                    &ctx.cancel,
                )
                .await?;
            output::print_done(&format!("station {mac} removed from '{ssid}'"), ctx.quiet);
            push_hint(&ssid, ctx.quiet);
            Ok(())
        }

        StationCommand::List { ssid } => {
            let snap = ctx.site.snapshot();
            let stations = &snap.ssid(&ssid)?.stations;
            let out = output::render_list(
                ctx.output,
                stations,
                |s| StationRow::from(s),
                |s| s.mac.to_string(),
            )?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
    }
}
