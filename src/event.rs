use notify::{op, RawEvent};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Config;

/// What happened to a path, reduced from a `notify` op bitset.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OpKind {
    Create,
    Write,
    Remove,
    Rename,
    /// Attribute / permission changes only.
    Metadata,
}

impl OpKind {
    /// Picks the most significant operation out of `op`.
    ///
    /// Returns `None` for ops that carry no file change, like `RESCAN`.
    pub fn from_op(op_: op::Op) -> Option<Self> {
        if op_.contains(op::CREATE) {
            Some(OpKind::Create)
        } else if op_.contains(op::REMOVE) {
            Some(OpKind::Remove)
        } else if op_.contains(op::RENAME) {
            Some(OpKind::Rename)
        } else if op_.intersects(op::WRITE | op::CLOSE_WRITE) {
            Some(OpKind::Write)
        } else if op_.contains(op::CHMOD) {
            Some(OpKind::Metadata)
        } else {
            None
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OpKind::Create => "CREATE",
            OpKind::Write => "WRITE",
            OpKind::Remove => "REMOVE",
            OpKind::Rename => "RENAME",
            OpKind::Metadata => "CHMOD",
        })
    }
}

/// A single change notification from the event source.
#[derive(Clone, Debug)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: OpKind,
    pub timestamp: Instant,
}

impl WatchEvent {
    pub fn new(path: &Path, kind: OpKind) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Converts a raw `notify` event.
    ///
    /// Events without a path or without a file change yield `Ok(None)`;
    /// watcher failures come back as the error.
    pub fn from_raw(raw: RawEvent) -> Result<Option<Self>, notify::Error> {
        let op_ = raw.op?;
        Ok(match (raw.path, OpKind::from_op(op_)) {
            (Some(path), Some(kind)) => Some(Self::new(&path, kind)),
            _ => None,
        })
    }

    pub fn is_metadata(&self) -> bool {
        self.kind == OpKind::Metadata
    }
}

/// The one event standing for a coalesced burst of changes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Trigger {
    pub path: PathBuf,
    pub kind: OpKind,
    startup: bool,
}

impl Trigger {
    /// The trigger injected once watches are armed, forcing a first build.
    pub fn startup(root: &Path) -> Self {
        Self {
            path: root.to_path_buf(),
            kind: OpKind::Write,
            startup: true,
        }
    }

    pub const fn is_startup(&self) -> bool {
        self.startup
    }

    /// Whether acting on this needs the build tool, or only a rerun.
    pub fn requires_rebuild(&self, config: &Config) -> bool {
        self.startup || config.requires_rebuild(&self.path)
    }
}

impl From<WatchEvent> for Trigger {
    fn from(event: WatchEvent) -> Self {
        Self {
            path: event.path,
            kind: event.kind,
            startup: false,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.startup {
            write!(f, "startup ({})", self.path.display())
        } else {
            write!(f, "{} ({})", self.path.display(), self.kind)
        }
    }
}
