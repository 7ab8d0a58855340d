#![allow(unsafe_code)]

use std::io::{self, Read, Write};
use std::process::{ChildStderr, ChildStdout, Command, ExitStatus};
use std::thread::{self, JoinHandle};

pub use self::imp::Process;

/// Copies everything `reader` yields into `writer` on a thread of its own.
pub fn forward<R, W>(name: &str, mut reader: R, mut writer: W) -> io::Result<JoinHandle<io::Result<u64>>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            let copied = io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            Ok(copied)
        })
}

/// Reads `reader` to its end on a thread of its own.
pub fn capture<R>(name: &str, mut reader: R) -> io::Result<JoinHandle<io::Result<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new().name(name.to_owned()).spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

#[cfg(unix)]
pub(crate) fn from_nix_error(err: nix::Error) -> io::Error {
    match err {
        nix::Error::Sys(errno) => io::Error::from_raw_os_error(errno as i32),
        nix::Error::InvalidPath => io::Error::new(io::ErrorKind::InvalidInput, err),
        _ => io::Error::new(io::ErrorKind::Other, err),
    }
}

#[cfg(unix)]
mod imp {
    use super::from_nix_error;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::{setsid, Pid};
    use std::convert::TryInto;
    use std::io::{self, Result};
    use std::os::unix::process::CommandExt;
    use std::process::{Child, Command};

    /// A spawned child leading its own session and process group.
    ///
    /// Killing it takes down everything it started too.
    pub struct Process {
        pub(super) child: Child,
        pgid: Pid,
    }

    impl Process {
        pub fn spawn(mut command: Command) -> Result<Self> {
            debug!("Assembled command {:?}", command);

            unsafe {
                command.pre_exec(|| setsid().map_err(from_nix_error).map(|_| ()));
            }

            let child = command.spawn()?;
            let pgid = child
                .id()
                .try_into()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

            Ok(Self {
                child,
                pgid: Pid::from_raw(pgid),
            })
        }

        /// Sends SIGKILL to the whole process group.
        pub fn kill(&mut self) -> Result<()> {
            debug!("Sending SIGKILL to process group {}", self.pgid);
            killpg(self.pgid, Signal::SIGKILL).map_err(from_nix_error)
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io::Result;
    use std::process::{Child, Command};

    pub struct Process {
        pub(super) child: Child,
    }

    impl Process {
        pub fn spawn(mut command: Command) -> Result<Self> {
            debug!("Assembled command {:?}", command);
            command.spawn().map(|child| Self { child })
        }

        pub fn kill(&mut self) -> Result<()> {
            self.child.kill()
        }
    }
}

impl Process {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Blocks until the child has exited, and reaps it.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Kills and reaps a child nobody is going to look after.
    fn abandon(mut self) {
        if let Err(err) = self.kill() {
            debug!("Couldn't kill abandoned process {}: {}", self.id(), err);
        }

        if let Err(err) = self.wait() {
            error!("Waiting for abandoned process {} failed: {}", self.id(), err);
        }
    }
}

/// Finishes setting up a freshly spawned child.
///
/// When `setup` fails the child is killed and reaped before the error is
/// returned, so no process outlives a failed start.
pub fn set_up<T, F>(mut process: Process, setup: F) -> io::Result<(Process, T)>
where
    F: FnOnce(&mut Process) -> io::Result<T>,
{
    match setup(&mut process) {
        Ok(value) => Ok((process, value)),
        Err(err) => {
            process.abandon();
            Err(err)
        }
    }
}

/// Builds a `Command` for `program` with piped output and no input.
pub fn piped(program: impl AsRef<std::ffi::OsStr>) -> Command {
    use std::process::Stdio;

    let mut command = Command::new(program);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}
