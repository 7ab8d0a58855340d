//! Configuration for freshen.
//!
//! The [`Config`] struct is not constructable, use [`ConfigBuilder`]. It is
//! read-only once built and is shared between the threads by `Arc`.
//!
//! # Examples
//!
//! ```
//! # use freshen::config::ConfigBuilder;
//! ConfigBuilder::default()
//!     .working_dir(".")
//!     .entry_point("./cmd/server")
//!     .build()
//!     .expect("mission failed");
//! ```

use std::{
    env, io,
    path::{Path, PathBuf},
    time::Duration,
};

pub mod file;

/// Settings of the watch / build / run cycle.
#[derive(Builder, Clone, Debug)]
#[builder(setter(into))]
#[builder(build_fn(validate = "Self::validate"))]
#[non_exhaustive]
pub struct Config {
    /// Root of the directory tree to watch.
    #[builder(default = "PathBuf::from(\".\")")]
    pub working_dir: PathBuf,
    /// Package or path handed to the build tool as its last argument.
    #[builder(default = "String::from(\".\")")]
    pub entry_point: String,
    /// Where the built binary and the build error log are written.
    #[builder(default = "PathBuf::from(\"tmp\")")]
    pub temp_dir: PathBuf,
    /// Extensions (with their leading period) whose changes are acted upon.
    #[builder(default = "vec![\".go\".into(), \".html\".into()]")]
    pub watch_extensions: Vec<String>,
    /// Watched extensions that only need the binary rerun, not rebuilt.
    #[builder(default = "vec![\".html\".into()]")]
    pub no_rebuild_extensions: Vec<String>,
    /// Directories, relative to `working_dir`, that are never watched.
    #[builder(default = "default_ignored_dirs()")]
    pub ignored_dirs: Vec<String>,
    /// Wait between receiving a trigger and starting the build.
    #[builder(default = "Duration::from_millis(300)")]
    pub build_delay: Duration,
    /// Quiet period coalescing bursts of file events into one trigger.
    #[builder(default = "Duration::from_millis(50)")]
    pub quiet_period: Duration,
    /// File name of the built binary inside `temp_dir`.
    #[builder(default = "String::from(\"freshen-build\")")]
    pub build_name: String,
    /// File name of the build error log inside `temp_dir`.
    #[builder(default = "String::from(\"freshen-build-errors.log\")")]
    pub build_log_filename: String,
    /// Program invoked as `<build_tool> build -o <binary> ... <entry_point>`.
    #[builder(default = "String::from(\"go\")")]
    pub build_tool: String,
    /// Passed as `-tags` when not empty.
    #[builder(default)]
    pub tags: String,
    /// Passed as `-ldflags` when not empty.
    #[builder(default)]
    pub ldflags: String,
    /// Pass `-trimpath`.
    #[builder(default)]
    pub trimpath: bool,
    #[builder(default)]
    pub verbose: bool,
}

fn default_ignored_dirs() -> Vec<String> {
    vec![
        "tmp".into(),
        "node_modules".into(),
        ".git".into(),
        ".vscode".into(),
    ]
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(dir) = &self.working_dir {
            if dir.as_os_str().is_empty() {
                return Err("working_dir must not be empty".into());
            }
        }

        if self.watch_extensions.as_ref().map_or(false, Vec::is_empty) {
            return Err("watch_extensions must not be empty".into());
        }

        if self.build_name.as_ref().map_or(false, |n| n.trim().is_empty()) {
            return Err("build_name must not be empty".into());
        }

        Ok(())
    }
}

/// Extension of `path` including the leading period, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Makes `path` absolute, resolving symlinks when it exists.
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                Ok(env::current_dir()?.join(path))
            }
        }
        Err(err) => Err(err),
    }
}

impl Config {
    /// Whether a change to `path` should be acted upon at all.
    ///
    /// Files under the temp directory never are, whatever their extension.
    /// `temp_dir` must be the absolute form from [`Config::temp_dir_absolute`].
    pub fn is_watched(&self, path: &Path, temp_dir: &Path) -> bool {
        if path.starts_with(temp_dir) {
            return false;
        }

        let ext = extension_of(path);
        self.watch_extensions.iter().any(|e| *e == ext)
    }

    /// Whether a change to `path` needs the build tool, not only a rerun.
    pub fn requires_rebuild(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        !self.no_rebuild_extensions.iter().any(|e| *e == ext)
    }

    /// Whether the directory at `relative` (to `working_dir`) is ignored.
    ///
    /// This is a plain string prefix test: `tmp` also ignores `tmpl` and
    /// `.git` also ignores `.github`.
    pub fn is_ignored_dir(&self, relative: &Path) -> bool {
        let relative = relative.to_string_lossy();
        if relative.is_empty() {
            return false;
        }

        self.ignored_dirs
            .iter()
            .any(|dir| relative.starts_with(dir.as_str()))
    }

    pub fn temp_dir_absolute(&self) -> io::Result<PathBuf> {
        absolute(&self.temp_dir)
    }

    /// Where the build tool writes the binary, `.exe` added on Windows.
    pub fn binary_path(&self) -> PathBuf {
        let path = self.temp_dir.join(&self.build_name);
        if cfg!(windows) && extension_of(&path) != ".exe" {
            let mut name = path.into_os_string();
            name.push(".exe");
            return PathBuf::from(name);
        }

        path
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.temp_dir.join(&self.build_log_filename)
    }
}
