use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use snapshift::backend::BtrfsBackend;
use snapshift::cli::Cli;
use snapshift::config::Config;
use snapshift::relocate::{Relocator, RunReport};
use snapshift::retention::RetentionManager;
use snapshift::size::WalkSizeProbe;
use snapshift::snapshot::list_snapshots;
use snapshift::transfer::{ProgressBarSink, ProgressSink, SnapshotTransferEngine, TracingSink};
use snapshift::volume::{
    discover_volumes, without_denylisted, DestinationSelector, StatvfsOracle, Volume,
};
use snapshift::RelocateError;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const EXIT_INCOMPLETE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(report) => {
            print_summary(&report);
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INCOMPLETE)
            }
        }
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            let aborts = e
                .downcast_ref::<RelocateError>()
                .map_or(false, RelocateError::aborts_run);
            ExitCode::from(if aborts { EXIT_CONFIG } else { EXIT_INCOMPLETE })
        }
    }
}

async fn run(cli: &Cli) -> Result<RunReport> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let volumes = if cli.volumes.is_empty() {
        discover_volumes(&config)
            .await
            .context("Failed to discover candidate volumes")?
    } else {
        let explicit = cli.volumes.iter().map(Volume::new).collect();
        without_denylisted(explicit, &config.denylist)
    };
    if volumes.is_empty() {
        return Err(RelocateError::NoCandidateVolumes.into());
    }
    tracing::debug!("Candidate volumes: {:?}", volumes);

    let snapshots = list_snapshots(&config.source_dir)
        .with_context(|| format!("Failed to list {}", config.source_dir.display()))?;
    if snapshots.is_empty() {
        tracing::info!("No snapshots in {}", config.source_dir.display());
    }

    let backend = Arc::new(BtrfsBackend::new(&config.btrfs_path));
    let sink: Arc<dyn ProgressSink> = if cli.progress {
        Arc::new(ProgressBarSink::new())
    } else {
        Arc::new(TracingSink)
    };

    let engine = SnapshotTransferEngine::new(
        backend.clone(),
        Arc::new(WalkSizeProbe::new()),
        sink,
        config.target_subpath.clone(),
        config.poll_interval(),
    );
    let relocator = Relocator::new(
        DestinationSelector::new(Arc::new(StatvfsOracle)),
        engine,
        RetentionManager::new(backend),
    )
    .dry_run(cli.dry_run);

    let report = relocator.run(&snapshots, &volumes).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(report)
}

fn print_summary(report: &RunReport) {
    let total = report.snapshots.len();
    if report.dry_run {
        eprintln!("{} {} snapshot(s) planned", "Dry run:".cyan().bold(), total);
        return;
    }
    let failed = report.failed();
    let line = format!(
        "{} of {} snapshot(s) relocated, {} failed",
        report.relocated(),
        total,
        failed
    );
    if failed == 0 {
        eprintln!("{}", line.green());
    } else {
        eprintln!("{}", line.yellow());
    }
}
