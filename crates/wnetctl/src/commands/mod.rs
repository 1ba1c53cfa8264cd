//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod ap;
pub mod device;
pub mod site;
pub mod ssid;
pub mod station;
pub mod util;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wnetctl_config::Config;
use wnetctl_core::{AccessPointAgent, Backend, SiteHandle};
use wnetctl_ssh::SshConnector;

use crate::cli::{ApArgs, DeviceArgs, GlobalOpts, OutputFormat, SsidArgs, StationArgs};
use crate::error::CliError;

/// Everything a site-bound handler needs, built once per invocation.
pub struct Context {
    pub site: SiteHandle<SshConnector>,
    pub site_name: String,
    pub output: OutputFormat,
    pub quiet: bool,
    pub yes: bool,
    pub cancel: CancellationToken,
}

impl Context {
    /// Resolve `--site` (or the default), apply timeout overrides and load
    /// the site document.
    pub fn open(cfg: &Config, global: &GlobalOpts, cancel: CancellationToken) -> Result<Self, CliError> {
        let resolved = cfg.resolve_or_current(global.site.as_deref())?;
        let timeout = global.timeout.map_or(resolved.timeout, Duration::from_secs);
        let connect_timeout = global
            .connect_timeout
            .map_or(resolved.connect_timeout, Duration::from_secs);

        let connector = SshConnector::new(connect_timeout, timeout);
        let mut agent =
            AccessPointAgent::new(connector, Backend::from(resolved.backend)).with_port(resolved.port);
        if let Some(path) = &resolved.known_hosts {
            agent = agent.with_known_hosts(path);
        }

        let site = SiteHandle::open(resolved.store(), agent)?;
        Ok(Self {
            site,
            site_name: resolved.name,
            output: util::output_format(global, cfg),
            quiet: global.quiet,
            yes: global.yes,
            cancel,
        })
    }
}

/// Commands that operate on an open site.
#[derive(Debug)]
pub enum SiteBound {
    Device(DeviceArgs),
    Ap(ApArgs),
    Ssid(SsidArgs),
    Station(StationArgs),
}

/// Dispatch a site-bound command to its handler.
pub async fn dispatch(cmd: SiteBound, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        SiteBound::Device(args) => device::handle(ctx, args).await,
        SiteBound::Ap(args) => ap::handle(ctx, args).await,
        SiteBound::Ssid(args) => ssid::handle(ctx, args).await,
        SiteBound::Station(args) => station::handle(ctx, args).await,
    }
}
