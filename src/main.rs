//! Sideload - Main entry point

use anyhow::Context;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{File, OpenOptions};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use sideload::app::App;
use sideload::cli::{Cli, Commands};
use sideload::config::SideloadConfig;
use sideload::content::LocalFile;
use sideload::error::SideloadError;
use sideload::preflight;
use sideload::worker::{InstallWorker, WorkerEvent};

/// Initialize logging. `RUST_LOG` overrides the default `info` level.
///
/// In TUI mode logs go to a file so they do not tear the alternate screen.
/// If that file cannot be opened, logging is switched off for the session.
fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true);

    let Some(path) = log_file else {
        builder.with_writer(std::io::stderr).init();
        return;
    };

    match open_log_file(path) {
        Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        Err(e) => {
            eprintln!(
                "⚠ Could not open log file {}: {}; logging is disabled",
                path.display(),
                e
            );
            builder.with_writer(std::io::sink).init();
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let tui_mode = matches!(cli.command, None | Some(Commands::Tui { .. }));
    let config = SideloadConfig::load_or_default(cli.config.as_deref());
    let log_file = match (&config, tui_mode) {
        (Ok(config), true) => Some(config.cache_root.join("sideload.log")),
        _ => None,
    };
    init_logging(log_file.as_deref());
    info!("Sideload starting up");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            eprintln!("✗ Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!("Effective configuration: {:?}", config);

    let result = match cli.command {
        Some(Commands::Install {
            apk,
            obb,
            skip_preflight,
            save_config,
        }) => run_headless(&config, cli.dry_run, apk, obb, skip_preflight, save_config),
        Some(Commands::Tui {
            apk,
            obb,
            skip_preflight,
        }) => run_tui(&config, cli.dry_run, apk, obb, skip_preflight),
        Some(Commands::Infer { filename }) => run_infer(&filename),
        Some(Commands::Check) => run_check(&config),
        Some(Commands::Validate { file }) => run_validate(&file),
        None => run_tui(&config, cli.dry_run, None, None, false),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn ensure_preflight(config: &SideloadConfig, skip: bool) -> anyhow::Result<()> {
    if skip {
        info!("Preflight checks skipped");
        return Ok(());
    }
    let result = preflight::verify_environment(config);
    if !result.is_ok() {
        preflight::print_report(&result);
    }
    result.into_result()?;
    Ok(())
}

/// Run one installation without the TUI, printing each notification
fn run_headless(
    config: &SideloadConfig,
    dry_run: bool,
    apk: PathBuf,
    obb: PathBuf,
    skip_preflight: bool,
    save_config: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    if let Some(path) = save_config {
        config.save_to_file(&path)?;
        println!("✓ Configuration saved to {}", path.display());
    }
    ensure_preflight(config, skip_preflight)?;

    let (worker, events) = InstallWorker::spawn(config.orchestrator(dry_run));
    let run = worker
        .submit_handles(Box::new(LocalFile::new(apk)), Box::new(LocalFile::new(obb)))
        .context("Failed to start installation")?;
    info!("Submitted run {}", run);

    let mut failed = false;
    let mut ready = false;
    for event in events.iter() {
        match event {
            WorkerEvent::StateChanged { state, .. } => println!("• {}", state),
            WorkerEvent::Failed { message, .. } => {
                failed = true;
                eprintln!("✗ {}", message);
            }
            WorkerEvent::Ready { .. } => {
                ready = true;
                break;
            }
        }
    }

    if !ready {
        error!("Install worker stopped before run {} finished", run);
        eprintln!("✗ The installation was interrupted");
        return Ok(ExitCode::FAILURE);
    }
    if failed {
        return Ok(ExitCode::FAILURE);
    }
    println!("✓ Installer launched; finish the installation on screen");
    Ok(ExitCode::SUCCESS)
}

/// Run the interactive installer
fn run_tui(
    config: &SideloadConfig,
    dry_run: bool,
    apk: Option<PathBuf>,
    obb: Option<PathBuf>,
    skip_preflight: bool,
) -> anyhow::Result<ExitCode> {
    ensure_preflight(config, skip_preflight)?;

    let (worker, events) = InstallWorker::spawn(config.orchestrator(dry_run));
    let mut app = App::new(worker, events, apk, obb);

    enable_raw_mode().context("Failed to enable raw mode")?;
    crossterm::execute!(stdout(), crossterm::terminal::EnterAlternateScreen)
        .context("Failed to enter alternate screen")?;

    let result = Terminal::new(CrosstermBackend::new(stdout()))
        .context("Failed to create terminal")
        .and_then(|mut terminal| app.run(&mut terminal));

    // Always attempt cleanup, even if the app failed
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(stdout(), crossterm::terminal::LeaveAlternateScreen);

    result.map(|()| ExitCode::SUCCESS)
}

fn run_infer(filename: &str) -> anyhow::Result<ExitCode> {
    let identifier = sideload::infer(filename)
        .map_err(SideloadError::from)
        .with_context(|| format!("Cannot stage {}", filename))?;
    println!("{}", identifier);
    Ok(ExitCode::SUCCESS)
}

fn run_check(config: &SideloadConfig) -> anyhow::Result<ExitCode> {
    let result = preflight::verify_environment(config);
    preflight::print_report(&result);
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_validate(path: &Path) -> anyhow::Result<ExitCode> {
    info!("Validating configuration file: {:?}", path);
    let config = SideloadConfig::load_from_file(path)?;
    match config.validate() {
        Ok(()) => {
            println!("✓ Configuration file is valid: {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/nested/sideload.log");
        open_log_file(&path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_open_log_file_reports_unusable_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cache"), b"not a directory").unwrap();
        assert!(open_log_file(&dir.path().join("cache/sideload.log")).is_err());
    }

    #[test]
    fn test_infer_failure_is_an_error() {
        let err = run_infer("randomfile.obb").unwrap_err();
        assert!(err.downcast_ref::<SideloadError>().is_some());
        assert!(format!("{:#}", err).contains("Cannot stage randomfile.obb"));
    }
}
