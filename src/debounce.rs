//! Coalescing raw file events into triggers.
//!
//! Every qualifying event restarts a short quiet-period timer; when the timer
//! runs out the last event seen is sent to the orchestrator as the trigger.
//! Editors that save by writing a temp file and renaming it, or that write
//! several times per save, thus cause a single build.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Instant;

use crate::build::KillSwitch;
use crate::config::Config;
use crate::event::{Trigger, WatchEvent};
use crate::orchestrator::Message;
use crate::watcher::Event;

pub struct Debouncer {
    config: Arc<Config>,
    temp_dir: PathBuf,
    triggers: SyncSender<Message>,
    kill: KillSwitch,
    building: Arc<AtomicBool>,
}

impl Debouncer {
    /// `building` is the orchestrator's "build in progress" flag.
    pub fn new(
        config: Arc<Config>,
        triggers: SyncSender<Message>,
        kill: KillSwitch,
        building: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let temp_dir = config.temp_dir_absolute()?;
        Ok(Self {
            config,
            temp_dir,
            triggers,
            kill,
            building,
        })
    }

    /// Whether an event is worth a trigger at all.
    fn qualifies(&self, event: &WatchEvent) -> bool {
        !event.is_metadata() && self.config.is_watched(&event.path, &self.temp_dir)
    }

    /// Consumes events until the event source goes away or the orchestrator
    /// stops listening.
    pub fn run(self, events: Receiver<Event>) {
        let mut last: Option<WatchEvent> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let received = match deadline {
                Some(deadline) => {
                    events.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(raw) => match WatchEvent::from_raw(raw) {
                    Ok(Some(event)) => {
                        if self.qualifies(&event) {
                            deadline = Some(event.timestamp + self.config.quiet_period);
                            last = Some(event);
                        }
                    }
                    Ok(None) => {}
                    Err(err) => error!("watcher error {}", err),
                },
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    if let Some(event) = last.take() {
                        if !self.emit(event) {
                            return;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(event) = last.take() {
                        self.emit(event);
                    }
                    debug!("Event source closed, no more triggers");
                    return;
                }
            }
        }
    }

    /// Sends the trigger, then asks for the running build to be killed if
    /// this trigger will rebuild anyway. Returns false once nobody listens.
    fn emit(&self, event: WatchEvent) -> bool {
        let trigger = Trigger::from(event);
        debug!("Sending Event... {}", trigger);

        let rebuild = trigger.requires_rebuild(&self.config);
        if self.triggers.send(Message::Trigger(trigger)).is_err() {
            return false;
        }

        if rebuild && self.building.load(Ordering::SeqCst) {
            self.kill.request();
        }

        true
    }
}
