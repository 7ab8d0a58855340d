use std::fs;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{channel, sync_channel, TrySendError};
use std::sync::Arc;
use std::thread;

use log::{Level, LevelFilter};

use crate::build;
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::{Error, Result};
use crate::event::Trigger;
use crate::limits;
use crate::orchestrator::{Message, Orchestrator, ShutdownHandle};
use crate::scan;
use crate::signal;
use crate::watcher::Watcher;

/// Sets up `freshen | ...` log output on stderr.
///
/// Everything up to `Debug` passes the filter, the visible level is set
/// through the max level so `--verbose` can be applied after the config
/// file was read. `RUST_LOG`, when set, takes over.
pub fn init_logger() {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| match record.level() {
            Level::Warn => writeln!(buf, "freshen | WARNING! {}", record.args()),
            Level::Error => writeln!(buf, "freshen | ERROR! {}", record.args()),
            _ => writeln!(buf, "freshen | {}", record.args()),
        })
        .filter(None, LevelFilter::Debug)
        .filter(Some("notify"), LevelFilter::Warn)
        .filter(Some("walkdir"), LevelFilter::Warn);

    let from_env = std::env::var("RUST_LOG").ok();
    if let Some(filters) = &from_env {
        builder.parse_filters(filters);
    }

    if builder.try_init().is_ok() && from_env.is_none() {
        log::set_max_level(LevelFilter::Info);
    }
}

pub fn set_verbose(verbose: bool) {
    if verbose {
        log::set_max_level(LevelFilter::Debug);
    }
}

/// Watches, builds and reruns until SIGINT or SIGTERM.
///
/// Returns once a termination signal was handled, or with the error that
/// made carrying on pointless.
pub fn run(config: Config) -> Result<()> {
    run_with(config, signal::install)
}

/// Watches, builds and reruns until the shutdown handle is used.
///
/// `on_start` receives the handle before any thread is spawned.
pub fn run_with<F>(config: Config, on_start: F) -> Result<()>
where
    F: FnOnce(ShutdownHandle) -> Result<()>,
{
    let config = Arc::new(config);
    let (inbox, messages) = sync_channel(1);
    let (kill_switch, kill_requests) = build::kill_channel();
    let building = Arc::new(AtomicBool::new(false));

    let orchestrator = Orchestrator::new(config.clone(), kill_requests, building.clone());
    on_start(orchestrator.shutdown_handle(inbox.clone(), kill_switch.clone()))?;
    limits::raise_open_files_limit();

    fs::create_dir_all(&config.temp_dir)?;
    debug!("Watching extensions {:?}", config.watch_extensions);
    debug!("Ignoring directories {:?}", config.ignored_dirs);

    let (tx, rx) = channel();
    let mut watcher = Watcher::new(tx)?;
    scan::scan(&config, |dir| watcher.watch(dir).map_err(Error::from))?;
    info!("Watching {} directories", watcher.watched());

    // Only a shutdown request can have taken the slot already.
    if let Err(TrySendError::Full(_)) =
        inbox.try_send(Message::Trigger(Trigger::startup(&config.working_dir)))
    {
        debug!("Shutdown requested before the first build");
    }

    let debouncer = Debouncer::new(config.clone(), inbox.clone(), kill_switch, building)
        .map_err(|err| Error::Canonicalization(config.temp_dir.clone(), err))?;
    thread::Builder::new()
        .name("debounce".into())
        .spawn(move || debouncer.run(rx))?;
    drop(inbox);

    let result = orchestrator.run(messages);

    drop(watcher);
    result
}
