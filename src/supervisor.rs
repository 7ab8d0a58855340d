//! Keeps at most one instance of the built binary running.

use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crate::error::{Error, Result};
use crate::process::{self, Process};

struct Running {
    process: Process,
    // Forwarding threads end on their own once every holder of the pipes is gone.
    _stdout: Option<JoinHandle<io::Result<u64>>>,
    _stderr: Option<JoinHandle<io::Result<u64>>>,
}

/// Owner of the running target binary.
///
/// A new instance is only ever started after the previous one has been
/// killed and its exit observed.
pub struct Supervisor {
    binary: PathBuf,
    verbose: bool,
    current: Option<Running>,
}

impl Supervisor {
    pub fn new(binary: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            binary: binary.into(),
            verbose,
            current: None,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Process ID of the running instance.
    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().map(|r| r.process.id())
    }

    /// Stops the running instance, if any, then starts a new one.
    pub fn restart(&mut self) -> Result<()> {
        self.stop();
        self.start()
    }

    /// Kills the running instance and blocks until it has exited.
    pub fn stop(&mut self) {
        let mut running = match self.current.take() {
            Some(running) => running,
            None => return,
        };

        debug!("Stopping {} (pid {})", self.binary.display(), running.process.id());
        if let Err(err) = running.process.kill() {
            // it may well have exited by itself already
            debug!("Couldn't kill {}: {}", self.binary.display(), err);
        }

        match running.process.wait() {
            Ok(status) => debug!("{} exited with {}", self.binary.display(), status),
            Err(err) => error!("Waiting for {} failed: {}", self.binary.display(), err),
        }
    }

    fn start(&mut self) -> Result<()> {
        debug_assert!(self.current.is_none());

        if self.verbose {
            info!("Running... {}", self.binary.display());
        } else {
            info!("Running...");
        }

        let child_error = |err: io::Error| Error::ChildProcess(self.binary.clone(), err);

        let process = Process::spawn(process::piped(&self.binary)).map_err(child_error)?;
        let (process, (stdout, stderr)) = process::set_up(process, |child| {
            let stdout = child
                .take_stdout()
                .map(|out| process::forward("run-stdout", out, io::stdout()))
                .transpose()?;
            let stderr = child
                .take_stderr()
                .map(|err| process::forward("run-stderr", err, io::stderr()))
                .transpose()?;
            Ok((stdout, stderr))
        })
        .map_err(child_error)?;

        self.current = Some(Running {
            process,
            _stdout: stdout,
            _stderr: stderr,
        });
        Ok(())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
