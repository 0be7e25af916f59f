use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "snapshift")]
#[command(about = "Move btrfs snapshots to the volume with the most free space", long_about = None)]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Relocate every snapshot in the configured source directory
    snapshift

    # Show where each snapshot would go
    snapshift --dry-run

    # Explicit destinations instead of mount discovery
    snapshift --volume /mnt/disk1 --volume /mnt/disk2

    # Machine-readable summary
    snapshift --json > report.json")]
pub struct Cli {
    /// Config file (default: ~/.config/snapshift/config.toml if present)
    #[arg(short, long, env = "SNAPSHIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the snapshots to relocate
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// btrfs executable
    #[arg(long)]
    pub btrfs: Option<PathBuf>,

    /// Candidate destination volume (repeatable, skips mount discovery)
    #[arg(long = "volume", value_name = "MOUNT")]
    pub volumes: Vec<PathBuf>,

    /// Seconds between progress samples
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Select destinations without transferring or deleting anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Show a progress bar instead of per-tick log lines
    #[arg(long)]
    pub progress: bool,

    /// Print a JSON run report to stdout
    #[arg(long)]
    pub json: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Default log filter when RUST_LOG is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Command-line values win over the config file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(source) = &self.source {
            config.source_dir = source.clone();
        }
        if let Some(btrfs) = &self.btrfs {
            config.btrfs_path = btrfs.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
    }
}
