use notify::{raw_watcher, RecommendedWatcher, RecursiveMode};
use std::path::Path;
use std::sync::mpsc::Sender;

pub use notify::Error;
pub use notify::RawEvent as Event;

/// Thin wrapper over the notify crate
///
/// Directories are subscribed one by one, non-recursively, as the scanner
/// finds them. Subscriptions last as long as the `Watcher` does and are
/// never removed, even when the directory goes away. All coupling to the
/// notify backend lives in this module.
pub struct Watcher {
    watcher_impl: RecommendedWatcher,
    watched: usize,
}

impl Watcher {
    pub fn new(tx: Sender<Event>) -> Result<Self, Error> {
        let watcher = raw_watcher(tx)?;
        Ok(Self {
            watcher_impl: watcher,
            watched: 0,
        })
    }

    /// Subscribes to changes of the entries directly inside `dir`.
    pub fn watch(&mut self, dir: &Path) -> Result<(), Error> {
        use notify::Watcher;

        self.watcher_impl.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched += 1;
        debug!("Watching {}", dir.display());
        Ok(())
    }

    pub const fn watched(&self) -> usize {
        self.watched
    }
}

#[cfg(test)]
mod tests {
    use super::Watcher;
    use std::fs;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn reports_changes_inside_watched_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (tx, rx) = channel();

        let mut watcher = Watcher::new(tx).unwrap();
        watcher.watch(&root).unwrap();
        assert_eq!(watcher.watched(), 1);

        fs::write(root.join("main.go"), "package main\n").unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let path = event.path.unwrap();
        assert_eq!(path.file_name().unwrap(), "main.go");
    }

    #[test]
    fn watching_a_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = channel();

        let mut watcher = Watcher::new(tx).unwrap();
        assert!(watcher.watch(&dir.path().join("gone")).is_err());
    }
}
