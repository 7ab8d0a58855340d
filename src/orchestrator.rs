//! The build / rerun state machine.
//!
//! Triggers are handled strictly one after the other on a single thread, so
//! at most one build runs at any time. A newer trigger can only cut a running
//! build short through the kill request cell.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use crate::build::{self, BuildAttempt, BuildResult, KillRequests, KillSwitch};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::Trigger;
use crate::supervisor::Supervisor;

/// What the orchestrator's inbox carries.
#[derive(Debug)]
pub enum Message {
    Trigger(Trigger),
    Shutdown,
}

/// Ends a running cycle from another thread.
///
/// A build in progress is killed, a build not yet started is skipped, and
/// the orchestrator stops the binary and returns.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    kill: KillSwitch,
    inbox: SyncSender<Message>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.kill.request();
        // Only wakes up an idle orchestrator; a full inbox is read soon anyway.
        let _ = self.inbox.try_send(Message::Shutdown);
    }
}

pub struct Orchestrator {
    config: Arc<Config>,
    kill: KillRequests,
    building: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    supervisor: Supervisor,
    started: bool,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, kill: KillRequests, building: Arc<AtomicBool>) -> Self {
        let supervisor = Supervisor::new(config.binary_path(), config.verbose);
        Self {
            config,
            kill,
            building,
            shutdown: Arc::new(AtomicBool::new(false)),
            supervisor,
            started: false,
        }
    }

    /// A handle ending this orchestrator's cycle. `inbox` and `kill` must be
    /// the senders of the channels it is run with.
    pub fn shutdown_handle(&self, inbox: SyncSender<Message>, kill: KillSwitch) -> ShutdownHandle {
        ShutdownHandle {
            requested: self.shutdown.clone(),
            kill,
            inbox,
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Handles triggers until a shutdown is requested or every sender is
    /// gone. The target binary is stopped on the way out, also on error.
    pub fn run(mut self, inbox: Receiver<Message>) -> Result<()> {
        let result = loop {
            if self.shutdown_requested() {
                info!("Shutting down");
                break Ok(());
            }

            match inbox.recv() {
                Ok(Message::Trigger(trigger)) => {
                    if let Err(err) = self.handle(&trigger) {
                        break Err(err);
                    }
                }
                Ok(Message::Shutdown) => {
                    info!("Shutting down");
                    break Ok(());
                }
                Err(_) => break Ok(()),
            }
        };

        self.supervisor.stop();
        result
    }

    /// Builds if the trigger needs it and reruns the binary on success.
    ///
    /// Only a failed build before the binary was ever started, or a build
    /// tool that can't be started at all, is an error.
    pub fn handle(&mut self, trigger: &Trigger) -> Result<BuildResult> {
        info!("Got event... {}", trigger);
        debug!("Waiting {:?} before rebuilding...", self.config.build_delay);
        thread::sleep(self.config.build_delay);

        if self.shutdown_requested() {
            debug!("Shutdown requested, skipping {}", trigger);
            return Ok(BuildResult::Killed);
        }

        let result = if trigger.requires_rebuild(&self.config) {
            self.build()?
        } else {
            BuildResult::Succeeded
        };

        match &result {
            BuildResult::Succeeded => self.rerun(),
            BuildResult::Killed => info!("Rebuild killed, previous build still running."),
            BuildResult::Failed(output) => {
                if !self.started {
                    return Err(Error::BuildFailed(output.clone()));
                }
                error!("Rebuild failed, previous build still running.");
            }
        }

        Ok(result)
    }

    fn build(&mut self) -> Result<BuildResult> {
        if let Err(err) = build::delete_error_log(&self.config) {
            error!("{}", err);
        }

        if self.kill.clear() {
            debug!("Dropped a stale kill request");
        }

        self.building.store(true, Ordering::SeqCst);
        // A shutdown requested before the clear above lost its kill request.
        if self.shutdown_requested() {
            self.building.store(false, Ordering::SeqCst);
            return Ok(BuildResult::Killed);
        }

        let result = BuildAttempt::spawn(&self.config).and_then(|attempt| attempt.wait(&self.kill));
        self.building.store(false, Ordering::SeqCst);

        let result = result?;
        if let BuildResult::Failed(output) = &result {
            error!("{}", output);
            if let Err(err) = build::save_error_log(&self.config, output) {
                error!("{}", err);
            }
        }

        Ok(result)
    }

    fn rerun(&mut self) {
        debug!("Restarting {}", self.supervisor.binary().display());

        match self.supervisor.restart() {
            Ok(()) => {
                info!("{}", "-".repeat(50));
                self.started = true;
            }
            Err(err) => error!("{}", err),
        }
    }
}
