//! Clap derive structures for the `wnetctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared value enums.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wnetctl -- provision OpenWrt access points over SSH
#[derive(Debug, Parser)]
#[command(
    name = "wnetctl",
    version,
    about = "Manage OpenWrt WiFi sites from the command line",
    long_about = "Bootstrap OpenWrt access points over SSH, push SSIDs to all of them,\n\
        and keep their fast-roaming neighbour lists in sync.\n\n\
        A change that fails on one access point is undone on the ones\n\
        already changed before the site document is updated.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Registered site to operate on (default: the selected site)
    #[arg(long, short = 's', env = "WNETCTL_SITE", global = true)]
    pub site: Option<String>,

    /// Output format (default: from config, else table)
    #[arg(long, short = 'o', env = "WNETCTL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Per-command timeout on access points, in seconds
    #[arg(long, env = "WNETCTL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// SSH connect timeout, in seconds
    #[arg(long, env = "WNETCTL_CONNECT_TIMEOUT", global = true)]
    pub connect_timeout: Option<u64>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// One name per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BandArg {
    /// 2.4 GHz
    #[value(name = "2g", alias = "2.4")]
    TwoGhz,
    /// 5 GHz
    #[value(name = "5g", alias = "5")]
    FiveGhz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthArg {
    /// No encryption
    Open,
    /// WPA2 personal
    Psk2,
    /// WPA3 personal
    Sae,
    /// WPA2/WPA3 transitional
    SaeMixed,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create, select and inspect sites
    Site(SiteArgs),

    /// Manage the device-type catalog
    #[command(alias = "dev")]
    Device(DeviceArgs),

    /// Add, remove and tune access points
    Ap(ApArgs),

    /// Manage SSIDs on every access point
    Ssid(SsidArgs),

    /// Manage per-SSID station allow-lists
    #[command(alias = "sta")]
    Station(StationArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Site ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SiteArgs {
    #[command(subcommand)]
    pub command: SiteCommand,
}

#[derive(Debug, Subcommand)]
pub enum SiteCommand {
    /// Create a new site document and register it
    Init(SiteInitArgs),

    /// List registered sites
    #[command(alias = "ls")]
    List,

    /// Make a site the default
    Select {
        /// Site name
        name: String,
    },

    /// Show the selected (or --site) site
    Show,

    /// Print the site document, secrets included
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Unregister a site
    #[command(alias = "rm")]
    Remove {
        /// Site name
        name: String,

        /// Also delete the site document
        #[arg(long)]
        purge: bool,
    },
}

#[derive(Debug, Args)]
pub struct SiteInitArgs {
    /// Site name
    pub name: String,

    /// Private key used for every session after bootstrap
    #[arg(long)]
    pub key: PathBuf,

    /// Public key installed during bootstrap (default: <key>.pub)
    #[arg(long)]
    pub public_key: Option<PathBuf>,

    /// Where to write the site document (default: data dir)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Human-readable description
    #[arg(long)]
    pub description: Option<String>,

    /// Regulatory country code applied to radios
    #[arg(long)]
    pub country: Option<String>,

    /// Appended to SSID names on 2.4 GHz radios
    #[arg(long, default_value = "")]
    pub suffix2: String,

    /// Appended to SSID names on 5 GHz radios
    #[arg(long, default_value = "")]
    pub suffix5: String,

    /// Admin account on the access points
    #[arg(long, default_value = "root")]
    pub admin_user: String,

    /// Prompt for the factory password of fresh devices (default: empty)
    #[arg(long)]
    pub ask_initial_password: bool,

    /// Verify host keys against this known_hosts file
    #[arg(long)]
    pub known_hosts: Option<PathBuf>,

    /// SSH port of the access points
    #[arg(long)]
    pub port: Option<u16>,
}

// ── Device types ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: DeviceCommand,
}

#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// Add a device type, or import several from a YAML file
    Add(DeviceAddArgs),

    /// Remove an unused device type
    #[command(alias = "rm")]
    Remove {
        /// Device type name
        name: String,
    },

    /// List device types
    #[command(alias = "ls")]
    List,
}

#[derive(Debug, Args)]
pub struct DeviceAddArgs {
    /// Device type name
    #[arg(required_unless_present = "file")]
    pub name: Option<String>,

    /// YAML map of name -> device type
    #[arg(long, short = 'f', conflicts_with = "name")]
    pub file: Option<PathBuf>,

    /// Hardware model
    #[arg(long, required_unless_present = "file")]
    pub model: Option<String>,

    #[arg(long, default_value = "")]
    pub cpu: String,

    #[arg(long, default_value = "")]
    pub architecture: String,

    /// 2.4 GHz radio as DEVICE:INTERFACE[:DRIVER], e.g. radio0:wlan0:ath9k
    #[arg(long)]
    pub wlan2: Option<String>,

    /// 5 GHz radio as DEVICE:INTERFACE[:DRIVER]
    #[arg(long)]
    pub wlan5: Option<String>,

    /// Wired interface bridged with the wireless LAN
    #[arg(long)]
    pub bridged: Option<String>,
}

// ── Access points ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ApArgs {
    #[command(subcommand)]
    pub command: ApCommand,
}

#[derive(Debug, Subcommand)]
pub enum ApCommand {
    /// Bootstrap a fresh access point and link it with every peer
    Add {
        /// Access point name
        name: String,

        /// Device type from the catalog
        #[arg(long, short = 'm')]
        model: String,

        /// Management address
        #[arg(long)]
        ip: IpAddr,

        /// Base MAC address (used as its roaming identifier)
        #[arg(long)]
        mac: Option<String>,

        /// Accept the device's host key on first contact
        #[arg(long)]
        trust_on_first_use: bool,
    },

    /// Unlink an access point from its peers and forget it
    #[command(alias = "rm")]
    Remove {
        /// Access point name
        name: String,
    },

    /// List access points
    #[command(alias = "ls")]
    List,

    /// Change channel or transmit power of one radio
    Tune {
        /// Access point name
        name: String,

        #[arg(long, short = 'b', value_enum)]
        band: BandArg,

        #[arg(long, short = 'c')]
        channel: Option<u16>,

        /// Transmit power in dBm
        #[arg(long, short = 'p', conflicts_with = "default_power")]
        power: Option<u8>,

        /// Reset transmit power to the driver default
        #[arg(long)]
        default_power: bool,
    },
}

// ── SSIDs ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SsidArgs {
    #[command(subcommand)]
    pub command: SsidCommand,
}

#[derive(Debug, Subcommand)]
pub enum SsidCommand {
    /// Create an SSID on every access point
    Add {
        /// SSID name
        name: String,

        #[arg(long, short = 'a', value_enum, default_value = "psk2")]
        auth: AuthArg,

        /// Passphrase (prompted when required and not given)
        #[arg(long, env = "WNETCTL_SSID_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Put clients on this VLAN
        #[arg(long)]
        vlan: Option<u16>,

        /// Isolate clients from each other
        #[arg(long)]
        restricted: bool,

        /// Only admit listed stations
        #[arg(long)]
        whitelisted: bool,
    },

    /// Remove an SSID from every access point
    #[command(alias = "rm")]
    Remove {
        /// SSID name
        name: String,
    },

    /// List SSIDs
    #[command(alias = "ls")]
    List,

    /// Re-push an SSID, including its station list, to every access point
    Push {
        /// SSID name
        name: String,
    },
}

// ── Stations ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StationArgs {
    #[command(subcommand)]
    pub command: StationCommand,
}

#[derive(Debug, Subcommand)]
pub enum StationCommand {
    /// Add or replace a station on an SSID's allow-list
    Add {
        /// SSID name
        ssid: String,

        /// Station MAC address
        mac: String,

        #[arg(long, short = 'n', default_value = "")]
        name: String,

        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Remove a station from an SSID
    #[command(alias = "rm")]
    Remove {
        /// SSID name
        ssid: String,

        /// Station MAC address
        mac: String,
    },

    /// List stations of an SSID
    #[command(alias = "ls")]
    List {
        /// SSID name
        ssid: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
