//! Entry point for the poem viewer.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml` (or `SHICI_CONFIG_PATH`).
//! - Open the poem library and hand it to the console loop.

mod console;

use crate::console::Console;
use anyhow::{Context, Result, anyhow};
use shici_core::config::{self, load_config};
use shici_core::{LibraryCommand, LibrarySession};
use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: shici-viewer [path-to-library.json]";
const SHUTDOWN_LOCK_ATTEMPTS: u32 = 20;
const SHUTDOWN_LOCK_RETRY: Duration = Duration::from_millis(100);

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let library_override = parse_args(env::args().skip(1))?;
    let config_path = config::config_path();
    let config = load_config(&config_path);
    if env::var_os("RUST_LOG").is_none() {
        set_log_level(reload_handle, config.log_level.as_filter_str());
    }
    let library_path = library_override.unwrap_or_else(|| config.library_path());
    info!(
        path = %library_path.display(),
        config = %config_path.display(),
        level = %config.log_level,
        "Starting poem viewer"
    );
    info!(
        program = %config.tts_program,
        voice = %config.tts_voice,
        rate = config.tts_rate,
        volume = config.tts_volume,
        "Active TTS configuration"
    );

    let session = LibrarySession::open(&config, &library_path)
        .with_context(|| format!("Opening poem library {}", library_path.display()))?;
    let session = Arc::new(Mutex::new(session));
    install_interrupt_handler(Arc::clone(&session));

    let handle = reload_handle.clone();
    let mut console = Console::new(session, io::stdout())
        .with_log_level_hook(move |level| set_log_level(&handle, level.as_filter_str()));
    console.run(io::stdin().lock())?;
    info!("Console closed; exiting");
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>> {
    let path = args.next();
    if args.next().is_some() {
        return Err(anyhow!(USAGE));
    }
    match path.as_deref() {
        None => Ok(None),
        Some("-h" | "--help") => Err(anyhow!(USAGE)),
        Some(path) => Ok(Some(PathBuf::from(path))),
    }
}

/// Stop narration before the process goes away on Ctrl+C so no synthesizer
/// process outlives us.
fn install_interrupt_handler(session: Arc<Mutex<LibrarySession>>) {
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C; stopping narration");
        match lock_for_shutdown(&*session) {
            Some(mut guard) => {
                if let Err(err) = guard.apply_command(LibraryCommand::Stop) {
                    warn!("Failed to stop narration on exit: {err}");
                }
            }
            None => warn!("Console busy; exiting without stopping narration"),
        }
        std::process::exit(130);
    }) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }
}

/// The console only holds the session for the length of one command, so a
/// short wait is enough; give up rather than hang the signal thread.
fn lock_for_shutdown<T>(session: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    for _ in 0..SHUTDOWN_LOCK_ATTEMPTS {
        match session.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => thread::sleep(SHUTDOWN_LOCK_RETRY),
        }
    }
    None
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level: {err}");
    } else {
        info!(%level, "Applied log level");
    }
}
