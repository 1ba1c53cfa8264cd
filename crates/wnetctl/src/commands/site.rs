//! Site registry handlers. These never open an SSH session.

use std::ffi::OsString;
use std::path::PathBuf;

use serde::Serialize;
use tabled::Tabled;
use wnetctl_config::{self as config, Config, ResolvedSite, SiteEntry};
use wnetctl_core::{BackendKind, PersistentStore, SiteModel, YamlStore};

use crate::cli::{GlobalOpts, SiteArgs, SiteCommand, SiteInitArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SiteSummary {
    name: String,
    selected: bool,
    backend: BackendKind,
    description: Option<String>,
    path: PathBuf,
}

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Document")]
    path: String,
}

impl From<&SiteSummary> for SiteRow {
    fn from(s: &SiteSummary) -> Self {
        Self {
            marker: if s.selected { "*" } else { "" },
            name: s.name.clone(),
            description: s.description.clone().unwrap_or_default(),
            path: s.path.display().to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteOverview {
    name: String,
    path: PathBuf,
    backend: BackendKind,
    port: u16,
    known_hosts: Option<PathBuf>,
    admin_user: String,
    country: Option<String>,
    device_types: usize,
    access_points: usize,
    ssids: usize,
}

impl SiteOverview {
    fn new(resolved: &ResolvedSite, model: &SiteModel) -> Self {
        Self {
            name: resolved.name.clone(),
            path: resolved.path.clone(),
            backend: model.backend,
            port: resolved.port,
            known_hosts: resolved.known_hosts.clone(),
            admin_user: model.admin_user.clone(),
            country: model.country.clone(),
            device_types: model.devices.len(),
            access_points: model.access_points.len(),
            ssids: model.ssids.len(),
        }
    }
}

fn detail(s: &SiteOverview) -> String {
    [
        format!("Site:          {}", s.name),
        format!("Document:      {}", s.path.display()),
        format!("Backend:       {}", s.backend),
        format!("SSH port:      {}", s.port),
        format!(
            "Host keys:     {}",
            s.known_hosts
                .as_ref()
                .map_or_else(|| "pinned per access point".into(), |p| p.display().to_string())
        ),
        format!("Admin user:    {}", s.admin_user),
        format!("Country:       {}", s.country.as_deref().unwrap_or("-")),
        format!("Device types:  {}", s.device_types),
        format!("Access points: {}", s.access_points),
        format!("SSIDs:         {}", s.ssids),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: SiteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config()?;
    let format = util::output_format(global, &cfg);

    match args.command {
        SiteCommand::Init(init) => {
            let name = init.name.clone();
            create_site(&mut cfg, init)?;
            config::save_config(&cfg)?;
            output::print_done(&format!("site '{name}' created"), global.quiet);
            Ok(())
        }

        SiteCommand::List => {
            let summaries: Vec<SiteSummary> = cfg
                .sites
                .iter()
                .map(|(name, entry)| SiteSummary {
                    name: name.clone(),
                    selected: cfg.default_site.as_deref() == Some(name.as_str()),
                    backend: entry.backend,
                    description: entry.description.clone(),
                    path: entry.path.clone(),
                })
                .collect();
            let out = output::render_list(format, &summaries, |s| SiteRow::from(s), |s| s.name.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SiteCommand::Select { name } => {
            cfg.select(&name)?;
            config::save_config(&cfg)?;
            output::print_done(&format!("site '{name}' selected"), global.quiet);
            Ok(())
        }

        SiteCommand::Show => {
            let resolved = cfg.resolve_or_current(global.site.as_deref())?;
            let model = resolved.store().load()?;
            let overview = SiteOverview::new(&resolved, &model);
            let out = output::render_single(format, &overview, detail, |s| s.name.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SiteCommand::Export { file } => {
            let resolved = cfg.resolve_or_current(global.site.as_deref())?;
            let model = resolved.store().load()?;
            match file {
                Some(path) => {
                    YamlStore::new(&path).save(&model)?;
                    output::print_done(&format!("exported to {}", path.display()), global.quiet);
                }
                None => {
                    let text = wnetctl_core::to_yaml(&model)?;
                    output::print_output(text.trim_end(), global.quiet);
                }
            }
            Ok(())
        }

        SiteCommand::Remove { name, purge } => {
            let prompt = if purge {
                format!("Unregister site '{name}' and delete its document?")
            } else {
                format!("Unregister site '{name}'?")
            };
            if !util::confirm(&prompt, "site remove", global.yes)? {
                return Ok(());
            }
            let entry = cfg.remove(&name)?;
            config::save_config(&cfg)?;
            if purge {
                match std::fs::remove_file(&entry.path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            output::print_done(&format!("site '{name}' removed"), global.quiet);
            Ok(())
        }
    }
}

/// Register the site, then write its first document.
fn create_site(cfg: &mut Config, init: SiteInitArgs) -> Result<(), CliError> {
    let public_key = init.public_key.unwrap_or_else(|| {
        let mut path = OsString::from(init.key.as_os_str());
        path.push(".pub");
        PathBuf::from(path)
    });
    if !public_key.is_file() {
        return Err(CliError::Validation {
            field: "public-key".into(),
            reason: format!("{} is not a readable file", public_key.display()),
        });
    }
    if let Some(country) = &init.country {
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CliError::Validation {
                field: "country".into(),
                reason: format!("expected a two-letter code, got '{country}'"),
            });
        }
    }

    let path = init
        .path
        .unwrap_or_else(|| config::new_site_path(&config::data_dir()));
    if path.exists() {
        return Err(CliError::AlreadyExists {
            resource_type: "site document".into(),
            identifier: path.display().to_string(),
        });
    }

    let mut entry = SiteEntry::new(&path);
    entry.description = init.description;
    entry.known_hosts = init.known_hosts;
    entry.port = init.port;
    cfg.add_site(&init.name, entry)?;

    let password = match config::admin_password_from_env() {
        Some(secret) => secret,
        None => util::prompt_new_secret("Admin password")?,
    };
    let initial_password = if init.ask_initial_password {
        Some(util::prompt_new_secret("Factory password")?)
    } else {
        None
    };

    let mut model = SiteModel::new(init.key, public_key);
    model.password = Some(password);
    model.initial_password = initial_password;
    model.admin_user = init.admin_user;
    model.country = init.country.map(|c| c.to_ascii_uppercase());
    model.ssid_suffix2 = init.suffix2;
    model.ssid_suffix5 = init.suffix5;

    YamlStore::new(&path).save(&model)?;
    tracing::info!(site = %init.name, path = %path.display(), "site document written");
    Ok(())
}
