#![allow(unsafe_code)]

/// Upper bound for the open-files soft limit we ask for.
pub const WANTED_OPEN_FILES: u64 = 10_000;

/// Raises the soft limit on open files towards [`WANTED_OPEN_FILES`].
///
/// Watching a large tree can take one descriptor per directory. The hard
/// limit is never exceeded and failing to raise is only worth a warning.
#[cfg(unix)]
pub fn raise_open_files_limit() {
    use nix::libc::{getrlimit, rlimit, setrlimit, RLIMIT_NOFILE};

    let mut limit = rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };

    if unsafe { getrlimit(RLIMIT_NOFILE, &mut limit) } != 0 {
        warn!("Couldn't read the open files limit: {}", std::io::Error::last_os_error());
        return;
    }

    #[allow(clippy::unnecessary_cast)]
    let wanted = WANTED_OPEN_FILES.min(limit.rlim_max as u64);
    if limit.rlim_cur as u64 >= wanted {
        return;
    }

    debug!("Raising open files limit from {} to {}", limit.rlim_cur, wanted);
    limit.rlim_cur = wanted as _;
    if unsafe { setrlimit(RLIMIT_NOFILE, &limit) } != 0 {
        warn!("Couldn't raise the open files limit: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
pub fn raise_open_files_limit() {}
