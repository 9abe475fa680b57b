// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor daemon (supd)
//!
//! Long-running process hosting the MCP multiplexer and health sweeps.
//!
//! Subcommands:
//! - `start` (default): run the multiplexer until SIGTERM/SIGINT
//! - `migrate`: apply schema migrations and exit
//! - `maintenance <sweep|prune-spawns>`: one-off maintenance operations

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::Path;
use std::time::Duration;

use sup_core::{SystemClock, UuidIdGen};
use sup_daemon::lifecycle::{self, Config, LifecycleError, StartupResult};
use sup_engine::HealthSweeper;
use sup_storage::{Gateway, InstanceStore, SpawnStore, SCHEMA_VERSION};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Retention for terminal spawn rows in `maintenance prune-spawns`.
const SPAWN_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--version") | Some("-V") | Some("-v") => {
            println!("supd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some("--help") | Some("-h") | Some("help") => {
            print_help();
            Ok(())
        }
        Some("migrate") => migrate(),
        Some("maintenance") => maintenance(args.get(1).map(String::as_str)),
        None | Some("start") => run().await,
        Some(other) => {
            eprintln!("error: unexpected argument '{other}'");
            eprintln!("Usage: supd [start | migrate | maintenance <op> | --help | --version]");
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!("supd {}", env!("CARGO_PKG_VERSION"));
    println!("Supervisor daemon - hosts per-project MCP endpoints and the subagent engine");
    println!();
    println!("USAGE:");
    println!("    supd [start]");
    println!("    supd migrate");
    println!("    supd maintenance <sweep | prune-spawns>");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
    println!();
    println!("Environment: SUP_STATE_DIR, SUP_DB_PATH, SUP_PROJECTS_FILE,");
    println!("SUP_SECRET_KEY, SUP_SECRET_KEY_ID, SUP_QUOTA_DIR, SUP_SWEEP_MS.");
}

/// Apply schema migrations and exit.
fn migrate() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Gateway::open(&config.db_path)?;
    println!(
        "migrations applied: {} at schema version {}",
        config.db_path.display(),
        SCHEMA_VERSION
    );
    Ok(())
}

/// One-off maintenance against the database, without binding endpoints.
fn maintenance(op: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let gateway = Gateway::open(&config.db_path)?;
    let clock = SystemClock;
    match op {
        Some("sweep") => {
            let sweeper = HealthSweeper::new(
                InstanceStore::new(gateway.clone(), clock.clone(), UuidIdGen),
                SpawnStore::new(gateway, clock),
            );
            let report = sweeper.sweep()?;
            println!(
                "sweep: {} instances marked stale, {} spawns marked abandoned",
                report.stale_instances.len(),
                report.abandoned_spawns.len()
            );
            Ok(())
        }
        Some("prune-spawns") => {
            let spawns = SpawnStore::new(gateway, clock);
            let pruned = spawns.prune_terminal_older_than(SPAWN_RETENTION)?;
            println!("prune-spawns: {pruned} terminal rows deleted");
            Ok(())
        }
        Some(other) => {
            eprintln!("error: unknown maintenance op '{other}'");
            eprintln!("Usage: supd maintenance <sweep | prune-spawns>");
            std::process::exit(1);
        }
        None => {
            eprintln!("error: maintenance requires an op");
            eprintln!("Usage: supd maintenance <sweep | prune-spawns>");
            std::process::exit(1);
        }
    }
}

/// Run the daemon until a shutdown signal.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    archive_oversized_log(&config.log_path);
    // Boot line lands before tracing attaches its non-blocking writer
    note_boot_in_log(&config)?;
    let log_guard = init_tracing(&config)?;

    info!("Starting supervisor daemon");

    let StartupResult {
        daemon,
        mut reload_rx,
    } = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            eprintln!("supd is already running");
            if let Ok(pid) = std::fs::read_to_string(&config.lock_path) {
                let pid = pid.trim();
                if !pid.is_empty() {
                    eprintln!("  pid: {pid}");
                }
            }
            std::process::exit(1);
        }
        Err(e) => {
            note_boot_failure(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    // The interval lives outside the loop; constructing it inside a select!
    // arm would reset it on every wakeup and starve the sweep under load.
    let mut sweep_tick = tokio::time::interval(config.sweep_interval);

    info!(
        endpoints = daemon.mux.endpoint_count(),
        "Daemon ready, endpoints bound under {}",
        config.endpoints_dir.display()
    );

    // Process supervisors and wrapper scripts wait for this line
    println!("READY");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading projects");
                if let Err(e) = daemon.reload() {
                    error!("Reload failed: {}", e);
                }
            }
            _ = reload_rx.recv() => {
                info!("Reload requested via meta endpoint");
                if let Err(e) = daemon.reload() {
                    error!("Reload failed: {}", e);
                }
            }
            _ = sweep_tick.tick() => {
                match daemon.sweeper.sweep() {
                    Ok(report) if !report.is_empty() => {
                        info!(
                            stale = report.stale_instances.len(),
                            abandoned = report.abandoned_spawns.len(),
                            "health sweep"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Health sweep failed: {}", e),
                }
            }
        }
    }

    daemon.shutdown();
    info!("Daemon stopped");
    Ok(())
}

/// Log size that triggers archiving at boot (10 MB).
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// How many timestamped log archives to keep.
const LOG_ARCHIVES: usize = 3;

/// Tag for boot-related lines appended outside the tracing pipeline.
const BOOT_TAG: &str = "[boot]";

/// Move an oversized log aside before tracing reopens it.
///
/// The archive is stamped `supd.log.<epoch-secs>` and older archives beyond
/// [`LOG_ARCHIVES`] are deleted. Best-effort throughout: a failed rename
/// must never keep the daemon from starting.
fn archive_oversized_log(log_path: &Path) {
    let oversized = std::fs::metadata(log_path)
        .map(|m| m.len() >= MAX_LOG_BYTES)
        .unwrap_or(false);
    if !oversized {
        return;
    }
    let Some(name) = log_path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let archived = log_path.with_file_name(format!("{name}.{stamp}"));
    if std::fs::rename(log_path, &archived).is_ok() {
        prune_log_archives(log_path);
    }
}

/// Delete all but the newest [`LOG_ARCHIVES`] stamped archives of `log_path`.
fn prune_log_archives(log_path: &Path) {
    let Some(dir) = log_path.parent() else {
        return;
    };
    let Some(name) = log_path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let prefix = format!("{name}.");
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let mut archives: Vec<std::path::PathBuf> = entries
        .flatten()
        .filter_map(|entry| {
            let file_name = entry.file_name();
            let stamp = file_name.to_str()?.strip_prefix(&prefix)?;
            let is_stamp = !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit());
            is_stamp.then(|| entry.path())
        })
        .collect();
    // Epoch stamps sort oldest-first; everything past the newest few goes
    archives.sort();
    for stale in archives.iter().rev().skip(LOG_ARCHIVES) {
        let _ = std::fs::remove_file(stale);
    }
}

/// Open the daemon log for appending, creating its directory on first boot.
fn open_log_for_append(log_path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
}

/// Append a boot line so operators can tell where this attempt begins when
/// several runs share one log file.
fn note_boot_in_log(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    let mut log = open_log_for_append(&config.log_path)?;
    writeln!(
        log,
        "{BOOT_TAG} supd {} pid {}",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    )?;
    Ok(())
}

/// Record a startup failure directly in the log file; the non-blocking
/// tracing writer may not flush before a fast exit.
fn note_boot_failure(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    if let Ok(mut log) = open_log_for_append(&config.log_path) {
        let _ = writeln!(log, "{BOOT_TAG} startup failed: {error}");
    }
}

/// Install the tracing subscriber writing to the daemon log.
///
/// The log file is opened once in append mode and handed to the non-blocking
/// writer; archiving already happened in [`archive_oversized_log`], so no
/// rolling appender is involved.
fn init_tracing(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log = open_log_for_append(&config.log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(log);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
