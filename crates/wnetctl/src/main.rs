mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::SiteBound;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    if let Err(err) = run(cli, cancel).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// First Ctrl-C stops the running mutation after its current step; undo
/// of completed steps still runs.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            cancel.cancel();
        }
    });
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<(), CliError> {
    let cmd = match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "wnetctl", &mut std::io::stdout());
            return Ok(());
        }

        // Registry commands work without an open site
        Command::Site(args) => return commands::site::handle(args, &cli.global),

        Command::Device(args) => SiteBound::Device(args),
        Command::Ap(args) => SiteBound::Ap(args),
        Command::Ssid(args) => SiteBound::Ssid(args),
        Command::Station(args) => SiteBound::Station(args),
    };

    let cfg = wnetctl_config::load_config()?;
    let ctx = commands::Context::open(&cfg, &cli.global, cancel)?;

    tracing::debug!(site = %ctx.site_name, command = ?cmd, "dispatching command");
    let result = commands::dispatch(cmd, &ctx).await;
    output::print_warnings(&ctx.site.take_warnings());
    result
}
