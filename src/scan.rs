//! One-off walk of the working directory arming a watch on every directory
//! that isn't ignored.

use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::{Error, Result};

/// What the walk does after visiting a directory.
pub enum Visit {
    Continue,
    /// Don't descend into this directory.
    SkipSubtree,
    /// Stop the walk and fail with this error.
    Abort(Error),
}

/// Walks every directory below (and including) `root`.
///
/// Files are not visited. Any I/O failure during the walk is returned.
pub fn walk<F>(root: &Path, mut visit: F) -> Result<()>
where
    F: FnMut(&DirEntry) -> Visit,
{
    let mut entries = WalkDir::new(root).into_iter();
    while let Some(entry) = entries.next() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }

        match visit(&entry) {
            Visit::Continue => {}
            Visit::SkipSubtree => entries.skip_current_dir(),
            Visit::Abort(err) => return Err(err),
        }
    }

    Ok(())
}

/// Hands every watchable directory under the working directory to `register`.
///
/// The temp directory (compared as an absolute path) and directories whose
/// path relative to the working directory starts with an ignored entry are
/// skipped along with everything below them. Returns how many directories
/// were registered.
pub fn scan<F>(config: &Config, mut register: F) -> Result<usize>
where
    F: FnMut(&Path) -> Result<()>,
{
    let root = config
        .working_dir
        .canonicalize()
        .map_err(|e| Error::Canonicalization(config.working_dir.clone(), e))?;
    let temp_dir = config
        .temp_dir_absolute()
        .map_err(|e| Error::Canonicalization(config.temp_dir.clone(), e))?;

    let mut registered = 0;
    walk(&root, |entry| {
        let path = entry.path();
        let absolute = match path.canonicalize() {
            Ok(absolute) => absolute,
            Err(err) => return Visit::Abort(Error::Canonicalization(path.to_path_buf(), err)),
        };

        if absolute == temp_dir {
            return Visit::SkipSubtree;
        }

        let relative = path.strip_prefix(&root).unwrap_or(path);
        if config.is_ignored_dir(relative) {
            debug!("IGNORING {}", relative.display());
            return Visit::SkipSubtree;
        }

        match register(path) {
            Ok(()) => {
                registered += 1;
                Visit::Continue
            }
            Err(err) => Visit::Abort(err),
        }
    })?;

    Ok(registered)
}
