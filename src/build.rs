//! Running the build tool.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::{self, Process};

/// How often a running build checks for kill requests.
const KILL_POLL: Duration = Duration::from_millis(20);

/// How a build attempt ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BuildResult {
    Succeeded,
    /// The build tool exited non-zero or wrote to stderr; carries that output.
    Failed(String),
    /// Superseded by a newer trigger and terminated.
    Killed,
}

/// Creates the single-slot kill request cell.
///
/// Requests never block and never queue: while one is outstanding, more
/// are dropped.
pub fn kill_channel() -> (KillSwitch, KillRequests) {
    let (tx, rx) = sync_channel(1);
    (KillSwitch { tx }, KillRequests { rx })
}

/// Sending half of the kill request cell.
#[derive(Clone, Debug)]
pub struct KillSwitch {
    tx: SyncSender<()>,
}

impl KillSwitch {
    pub fn request(&self) {
        // Full means a request is already pending, Disconnected that nobody builds anymore.
        let _ = self.tx.try_send(());
    }
}

/// Receiving half of the kill request cell, owned by the orchestrator.
#[derive(Debug)]
pub struct KillRequests {
    rx: Receiver<()>,
}

impl KillRequests {
    /// Drops a request left over from an earlier build.
    pub fn clear(&self) -> bool {
        let mut cleared = false;
        while let Ok(()) = self.rx.try_recv() {
            cleared = true;
        }
        cleared
    }

    pub fn pending(&self) -> std::result::Result<(), TryRecvError> {
        self.rx.try_recv()
    }

    fn wait(&self, timeout: Duration) -> std::result::Result<(), RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Arguments to the build tool:
/// `build -o <binary> [-tags T] [-ldflags L] [-trimpath] <entry point>`.
pub fn args(config: &Config) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["build".into(), "-o".into(), config.binary_path().into()];

    if !config.tags.is_empty() {
        args.push("-tags".into());
        args.push(config.tags.clone().into());
    }

    if !config.ldflags.is_empty() {
        args.push("-ldflags".into());
        args.push(config.ldflags.clone().into());
    }

    if config.trimpath {
        args.push("-trimpath".into());
    }

    args.push(config.entry_point.clone().into());
    args
}

fn command_line(config: &Config) -> String {
    let mut line = config.build_tool.clone();
    for arg in args(config) {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Removes the error log of the previous build, if there is one.
pub fn delete_error_log(config: &Config) -> Result<()> {
    let path = config.error_log_path();
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::LogFile(path, err)),
    }
}

pub fn save_error_log(config: &Config, output: &str) -> Result<()> {
    let path = config.error_log_path();
    fs::write(&path, output).map_err(|err| Error::LogFile(path, err))
}

/// One run of the build tool, from spawn to exit.
pub struct BuildAttempt {
    started: Instant,
    process: Process,
    stdout: Option<JoinHandle<io::Result<u64>>>,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
    killed: bool,
}

impl BuildAttempt {
    /// Starts the build tool. Its stdout goes to ours, its stderr is captured.
    pub fn spawn(config: &Config) -> Result<Self> {
        let spawn_error = |err: io::Error| Error::BuildSpawn(config.build_tool.clone(), err);

        let mut command = process::piped(&config.build_tool);
        command.args(args(config));
        debug!("Building... {}", command_line(config));

        let started = Instant::now();
        let process = Process::spawn(command).map_err(spawn_error)?;

        let (process, (stdout, stderr)) = process::set_up(process, |child| {
            let stdout = child
                .take_stdout()
                .map(|out| process::forward("build-stdout", out, io::stdout()))
                .transpose()?;
            let stderr = child
                .take_stderr()
                .map(|err| process::capture("build-stderr", err))
                .transpose()?;
            Ok((stdout, stderr))
        })
        .map_err(spawn_error)?;

        Ok(Self {
            started,
            process,
            stdout,
            stderr,
            killed: false,
        })
    }

    /// Waits for the build to end, killing it if a request comes in first.
    pub fn wait(mut self, kill: &KillRequests) -> Result<BuildResult> {
        let status = loop {
            if let Some(status) = self.process.try_wait()? {
                break status;
            }

            match kill.wait(KILL_POLL) {
                Ok(()) => {
                    info!("Building...killed");
                    if let Err(err) = self.process.kill() {
                        error!("Killing build error {}", err);
                    }
                    self.killed = true;
                    break self.process.wait()?;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break self.process.wait()?,
            }
        };

        let errors = self.collect_output();
        if self.killed {
            return Ok(BuildResult::Killed);
        }

        if !status.success() || !errors.is_empty() {
            let output = if errors.is_empty() {
                format!("build tool exited with {}", status)
            } else {
                errors
            };
            return Ok(BuildResult::Failed(output));
        }

        debug!("Building...done (took {:?})", self.started.elapsed());
        Ok(BuildResult::Succeeded)
    }

    fn collect_output(&mut self) -> String {
        if let Some(handle) = self.stdout.take() {
            match handle.join() {
                Ok(Err(err)) => warn!("Couldn't forward build output: {}", err),
                Err(_) => warn!("Build output thread panicked"),
                Ok(Ok(_)) => {}
            }
        }

        let captured = match self.stderr.take().map(JoinHandle::join) {
            Some(Ok(Ok(bytes))) => bytes,
            Some(Ok(Err(err))) => {
                error!("Error capturing stderr {}", err);
                Vec::new()
            }
            Some(Err(_)) => {
                error!("Build error capture thread panicked");
                Vec::new()
            }
            None => Vec::new(),
        };

        String::from_utf8_lossy(&captured).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{args, delete_error_log, kill_channel, save_error_log};
    use crate::config::ConfigBuilder;
    use std::ffi::OsString;
    use std::path::Path;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn plain_build_args() {
        let config = ConfigBuilder::default()
            .temp_dir("/tmp/out")
            .entry_point("./cmd/api")
            .build()
            .unwrap();

        let binary = config.binary_path().to_string_lossy().into_owned();
        assert_eq!(
            strings(args(&config)),
            vec!["build", "-o", binary.as_str(), "./cmd/api"]
        );
    }

    #[test]
    fn build_flags_in_order() {
        let config = ConfigBuilder::default()
            .tags("dev sqlite")
            .ldflags("-s -w")
            .trimpath(true)
            .build()
            .unwrap();

        let args = strings(args(&config));
        assert_eq!(
            &args[3..],
            &["-tags", "dev sqlite", "-ldflags", "-s -w", "-trimpath", "."]
        );
    }

    #[test]
    fn kill_requests_hold_one_slot() {
        let (switch, requests) = kill_channel();
        assert!(requests.pending().is_err());

        switch.request();
        switch.request();
        switch.clone().request();

        assert!(requests.pending().is_ok());
        assert!(requests.pending().is_err());

        switch.request();
        assert!(requests.clear());
        assert!(!requests.clear());
    }

    #[test]
    fn error_log_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::default().temp_dir(dir.path()).build().unwrap();
        let log = config.error_log_path();

        delete_error_log(&config).unwrap();
        save_error_log(&config, "main.go:1: expected 'package'").unwrap();
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "main.go:1: expected 'package'"
        );

        delete_error_log(&config).unwrap();
        assert!(!Path::new(&log).exists());
    }
}
