//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use harvester_core::ContentKind;

/// Harvest a content catalog and download the selected artifacts.
///
/// `harvest` scans catalog pages and keeps the items that pass each kind's
/// filters, resuming where the last run stopped. `links` turns harvested
/// records into a download list, and `download` fetches what is still pending.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// TOML config file (default: ./harvester.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan catalog pages and record accepted items
    Harvest(HarvestArgs),
    /// Merge harvested download URLs into the link list
    Links(LinksArgs),
    /// Download every pending link
    Download(DownloadArgs),
}

/// Arguments for `harvest`.
#[derive(clap::Args, Debug)]
pub struct HarvestArgs {
    /// Content kind to harvest (mods, textures, datapacks); repeatable, all when omitted
    #[arg(short, long = "kind", value_name = "KIND")]
    pub kinds: Vec<ContentKind>,

    /// Pages to scan per kind (overrides config)
    #[arg(long, value_name = "N")]
    pub max_pages: Option<u32>,
}

/// Arguments for `links`.
#[derive(clap::Args, Debug)]
pub struct LinksArgs {
    /// Content kind whose output to export; repeatable, all when omitted
    #[arg(short, long = "kind", value_name = "KIND")]
    pub kinds: Vec<ContentKind>,

    /// Link list file (overrides config)
    #[arg(long, value_name = "PATH")]
    pub links_file: Option<PathBuf>,
}

/// Arguments for `download`.
#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// Link list file (overrides config)
    #[arg(long, value_name = "PATH")]
    pub links_file: Option<PathBuf>,

    /// Destination directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100, overrides config)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,
}

/// Kinds selected on the command line, or every kind when none was given.
pub fn selected_kinds(kinds: &[ContentKind]) -> Vec<ContentKind> {
    if kinds.is_empty() {
        return ContentKind::ALL.to_vec();
    }
    let mut selected = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !selected.contains(kind) {
            selected.push(*kind);
        }
    }
    selected
}
