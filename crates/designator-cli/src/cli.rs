use std::path::PathBuf;

use clap::{Parser, Subcommand};

use designator::{TabId, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "designator")]
#[command(about = "Copy Playwright page-object properties from live web pages")]
#[command(
    long_about = "Designator finds the elements carrying your test-id attribute in a running \
browser tab and turns them into ready-to-paste Playwright page-object property declarations. \
Run `designator serve` once, connect the browser extension, then scan or pick from any terminal."
)]
pub struct Cli {
    /// Daemon port, shared by `serve` and every client command
    #[clap(long, global = true, env = "DESIGNATOR_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Also write logs to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Tab to scan (defaults to the active tab)
    #[clap(long)]
    pub tab: Option<TabId>,

    /// Keep only rows whose identifier or tag contains this text
    #[clap(long, short = 'f')]
    pub filter: Option<String>,

    /// Rows to copy: `all` or indices like `1,3-5` (implies nothing without --copy)
    #[clap(long, short = 's')]
    pub select: Option<String>,

    /// Copy the selected declaration lines to the clipboard
    #[clap(long, short = 'c')]
    pub copy: bool,

    /// Emit machine-readable JSON instead of the table
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct TabArgs {
    /// Tab to target (defaults to the active tab)
    #[clap(long)]
    pub tab: Option<TabId>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Track a different attribute (e.g. data-testid)
    SetAttribute { name: String },
    /// Include another element type in scans (e.g. a, select)
    AddType { tag: String },
    /// Stop including an element type in scans
    RemoveType { tag: String },
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon that bridges the browser extension and this CLI
    Serve(ServeArgs),
    /// List every element carrying the tracked attribute
    Scan(ScanArgs),
    /// Start pick mode in the browser and exit
    Pick(TabArgs),
    /// Stop a running pick session
    Stop(TabArgs),
    /// Show or edit the shared configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}
