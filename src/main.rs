use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

use climate_archiver::cli::{Args, Commands};
use climate_archiver::config::{load_or_default, ArchiveConfig, RemoteConfig, TransportKind};
use climate_archiver::orchestrator;
use climate_archiver::transport::credentials::{resolve_credentials, resolve_host};
use climate_archiver::transport::local::LocalTransport;
use climate_archiver::transport::ssh::{SshConfig, SshConnection, SshSession};
use climate_archiver::utils::size::format_size;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose, args.log_dir.as_deref())?;

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    // Load configuration and apply overrides
    let mut config = load_or_default(args.config.as_deref())?;
    args.apply_to(&mut config);
    let options = config.to_options()?;

    if args.dry_run {
        let plan = orchestrator::plan(&options)?;
        plan.log();
        return Ok(());
    }

    info!(
        "Starting archive run to {} via {} transport",
        options.target.display(),
        config.remote.transport
    );

    let summary = match config.remote.transport {
        TransportKind::Local => orchestrator::run(&options, || Ok(LocalTransport::new()))?,
        TransportKind::Managed => orchestrator::run(&options, || {
            SshConnection::connect(&ssh_config(&config.remote)?)
        })?,
        TransportKind::Session => orchestrator::run(&options, || {
            SshSession::connect(&ssh_config(&config.remote)?)
        })?,
    };

    if let Some(path) = &args.summary {
        summary.write_json(path)?;
    }

    info!("Archive run {} completed", summary.run_id);
    Ok(())
}

/// Initialize logging with the specified verbosity level.
///
/// When a log directory is given the same records also go to
/// `<dir>/<YYYYMMDD>_climate-archiver.log`.
fn initialize_logging(verbose: bool, log_dir: Option<&Path>) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(dir) = log_dir {
        let log_path = dir.join(format!("{}_climate-archiver.log", Local::now().format("%Y%m%d")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .context(format!("Failed to open log file {}", log_path.display()))?;
        loggers.push(WriteLogger::new(log_level, Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config and size)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            ArchiveConfig::default().save_to_yaml_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
        Commands::Size { paths, si, precision } => {
            for path in paths {
                match format_size(path.as_path(), !si, *precision) {
                    Some(size) => println!("{}\t{}", size, path.display()),
                    None => println!("-\t{} (not a file)", path.display()),
                }
            }
            if paths.len() > 1 {
                let existing: Vec<_> = paths.iter().filter(|p| p.is_file()).cloned().collect();
                if let Some(total) = format_size(&existing, !si, *precision) {
                    println!("{}\ttotal", total);
                }
            }
            Ok(())
        }
    }
}

/// Build SSH settings, prompting for anything missing
fn ssh_config(remote: &RemoteConfig) -> Result<SshConfig> {
    let host = resolve_host(remote.host.clone())?;
    let (username, auth) =
        resolve_credentials(remote.username.clone(), remote.private_key_path(), None)?;

    let mut config = SshConfig::new(host, username, auth);
    config.port = remote.port;
    config.connection_timeout = remote.connection_timeout();
    Ok(config)
}
