//! Turning SIGINT / SIGTERM into an orderly shutdown.

use crate::error::Result;
use crate::orchestrator::ShutdownHandle;

/// Routes termination signals to a dedicated thread.
///
/// Must run before any other thread is spawned: the blocked signal mask is
/// inherited by every thread started afterwards, so only the signal thread
/// ever sees them. The first signal kills a running build and asks the
/// orchestrator to stop the binary and return. A second one exits at once.
#[cfg(unix)]
pub fn install(shutdown: ShutdownHandle) -> Result<()> {
    use crate::process::from_nix_error;
    use nix::sys::signal::{SigSet, Signal};
    use std::process;
    use std::thread;

    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block().map_err(from_nix_error)?;

    thread::Builder::new().name("signals".into()).spawn(move || {
        let mut shutting_down = false;
        loop {
            let signal = match mask.wait() {
                Ok(signal) => signal,
                Err(err) => {
                    error!("Waiting for signals failed: {}", err);
                    return;
                }
            };
            debug!("Received {:?}", signal);

            if shutting_down {
                warn!("Second {:?}, exiting immediately", signal);
                process::exit(1);
            }
            shutting_down = true;
            shutdown.request();
        }
    })?;

    Ok(())
}

#[cfg(not(unix))]
pub fn install(_shutdown: ShutdownHandle) -> Result<()> {
    debug!("Signal handling is not available on this platform");
    Ok(())
}
