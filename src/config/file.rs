//! The `freshen.conf` YAML file.
//!
//! A missing file is not an error: the built-in defaults are used and a
//! warning points at `--init`, which writes those defaults out.

use std::{
    convert::TryFrom,
    fs,
    io::{self, Write},
    path::{Component, Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::{Config, ConfigBuilder};
use crate::error::{Error, Result};

pub const DEFAULT_FILE_NAME: &str = "freshen.conf";

/// Fields of the config file, keyed in PascalCase.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "PascalCase")]
pub struct ConfigFile {
    pub working_dir: String,
    pub entry_point: String,
    pub temp_dir: String,
    pub extensions_to_watch: Vec<String>,
    pub no_rebuild_extensions: Vec<String>,
    pub directories_to_ignore: Vec<String>,
    pub build_delay_milliseconds: i64,
    pub build_name: String,
    pub build_log_filename: String,
    pub build_tool: String,
    pub go_tags: String,
    pub go_ldflags: String,
    pub go_trimpath: bool,
    pub verbose_logging: bool,

    #[serde(skip)]
    using_defaults: bool,
}

impl ConfigFile {
    /// The built-in configuration.
    pub fn defaults() -> Self {
        Self {
            working_dir: ".".into(),
            entry_point: ".".into(),
            temp_dir: "tmp".into(),
            extensions_to_watch: vec![".go".into(), ".html".into()],
            no_rebuild_extensions: vec![".html".into()],
            directories_to_ignore: vec![
                "tmp".into(),
                "node_modules".into(),
                ".git".into(),
                ".vscode".into(),
            ],
            build_delay_milliseconds: 300,
            build_name: "freshen-build".into(),
            build_log_filename: "freshen-build-errors.log".into(),
            build_tool: "go".into(),
            go_tags: String::new(),
            go_ldflags: String::new(),
            go_trimpath: false,
            verbose_logging: false,
            using_defaults: true,
        }
    }

    /// Whether this came from the built-in defaults rather than a file.
    pub const fn using_defaults(&self) -> bool {
        self.using_defaults
    }

    pub fn override_tags(&mut self, tags: &str) {
        if !self.using_defaults {
            warn!("Overriding GoTags with provided --tags.");
        }

        self.go_tags = tags.to_owned();
    }

    pub fn override_verbose(&mut self, verbose: bool) {
        self.verbose_logging = verbose;
    }

    /// Sanitises values a human may have gotten wrong, falling back to the
    /// defaults where that is possible.
    pub fn validate(&mut self) -> Result<()> {
        let defaults = Self::defaults();

        self.working_dir = self.working_dir.trim().to_owned();
        if self.working_dir.is_empty() {
            return Err(Error::Config(
                "WorkingDir not set. Typically this should be set to \".\"".into(),
            ));
        }

        self.temp_dir = self.temp_dir.trim().to_owned();
        if self.temp_dir.is_empty() {
            self.temp_dir = defaults.temp_dir.clone();
            warn!("TempDir not provided, defaulting to {}.", self.temp_dir);
        }

        self.entry_point = self.entry_point.trim().to_owned();
        if self.entry_point.is_empty() {
            self.entry_point = defaults.entry_point.clone();
        }

        self.extensions_to_watch = sanitize_extensions("ExtensionsToWatch", &self.extensions_to_watch);
        self.no_rebuild_extensions =
            sanitize_extensions("NoRebuildExtensions", &self.no_rebuild_extensions);
        if self.extensions_to_watch.is_empty() {
            self.extensions_to_watch = defaults.extensions_to_watch.clone();
            warn!(
                "ExtensionsToWatch not provided, defaulting to {:?}.",
                self.extensions_to_watch
            );
        }

        let mut dirs: Vec<String> = Vec::with_capacity(self.directories_to_ignore.len());
        for dir in &self.directories_to_ignore {
            let dir = clean(dir.trim());
            if dirs.contains(&dir) {
                warn!("Duplicate directory {} in DirectoriesToIgnore.", dir);
                continue;
            }

            dirs.push(dir);
        }
        self.directories_to_ignore = dirs;

        if self.build_delay_milliseconds < 0 {
            self.build_delay_milliseconds = defaults.build_delay_milliseconds;
            warn!(
                "BuildDelayMilliseconds must not be negative, defaulting to {}.",
                self.build_delay_milliseconds
            );
        }

        if self.build_name.trim().is_empty() {
            self.build_name = defaults.build_name.clone();
            warn!("BuildName was not given, defaulting to {}.", self.build_name);
        }

        if self.build_log_filename.trim().is_empty() {
            self.build_log_filename = defaults.build_log_filename.clone();
            warn!(
                "BuildLogFilename was not given, defaulting to {}.",
                self.build_log_filename
            );
        }

        if self.build_tool.trim().is_empty() {
            self.build_tool = defaults.build_tool;
        }

        Ok(())
    }

    pub fn into_config(self) -> Result<Config> {
        // validate() has made this non-negative
        let delay = u64::try_from(self.build_delay_milliseconds).unwrap_or_default();

        ConfigBuilder::default()
            .working_dir(self.working_dir)
            .entry_point(self.entry_point)
            .temp_dir(self.temp_dir)
            .watch_extensions(self.extensions_to_watch)
            .no_rebuild_extensions(self.no_rebuild_extensions)
            .ignored_dirs(self.directories_to_ignore)
            .build_delay(Duration::from_millis(delay))
            .build_name(self.build_name)
            .build_log_filename(self.build_log_filename)
            .build_tool(self.build_tool)
            .tags(self.go_tags)
            .ldflags(self.go_ldflags)
            .trimpath(self.go_trimpath)
            .verbose(self.verbose_logging)
            .build()
            .map_err(Error::Config)
    }

    /// Writes the config, with a generated-file header, to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml_ng::to_string(self)?;

        let mut file = fs::File::create(path)?;
        writeln!(file, "# Generated config file for freshen.")?;
        writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(file, "# This file is in YAML format.")?;
        writeln!(file)?;
        file.write_all(yaml.as_bytes())?;
        Ok(())
    }

    /// Prints where the config came from and how it was understood.
    pub fn print(&self, path: &str) -> Result<()> {
        let absolute = super::absolute(Path::new(path))?;
        let stdout = io::stdout();
        let mut out = stdout.lock();

        writeln!(out, "Path to config file (flag): {}", path)?;
        writeln!(out, "Path to config file (absolute): {}", absolute.display())?;
        if self.using_defaults {
            writeln!(out, "Using built-in defaults.")?;
        }
        writeln!(out, "{}", serde_yaml_ng::to_string(self)?)?;
        Ok(())
    }
}

/// Reads and validates the config file at `path`.
///
/// A blank path or a missing file yields the built-in defaults.
pub fn read(path: &str) -> Result<ConfigFile> {
    if path.trim().is_empty() {
        return Ok(ConfigFile::defaults());
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(
                "Config file not found at {}, use --init to create it, using built-in defaults.",
                path
            );
            return Ok(ConfigFile::defaults());
        }
        Err(err) => return Err(err.into()),
    };

    info!("Using config from file: {}", path);
    parse(&contents)
}

/// Parses and validates config file contents.
pub fn parse(contents: &str) -> Result<ConfigFile> {
    let mut file: ConfigFile = serde_yaml_ng::from_str(contents)?;
    file.validate()?;
    Ok(file)
}

/// Writes the default config to `freshen.conf` in `dir`, leaving an
/// existing file alone.
pub fn create_default(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(DEFAULT_FILE_NAME);
    if path.exists() {
        warn!(
            "Config file already exists at {}, nothing written. Remove the --init flag.",
            path.display()
        );
        return Ok(path);
    }

    ConfigFile::defaults().write(&path)?;
    warn!(
        "Config file created with defaults at {}, remove the --init flag in the future.",
        path.display()
    );
    Ok(path)
}

fn sanitize_extensions(field: &str, extensions: &[String]) -> Vec<String> {
    let mut valid: Vec<String> = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let mut ext = ext.trim().to_owned();
        if ext.is_empty() {
            continue;
        }

        if !ext.starts_with('.') {
            warn!("{} {} missing leading period, added.", field, ext);
            ext.insert(0, '.');
        }

        if valid.contains(&ext) {
            warn!("{} duplicate {}, ignored.", field, ext);
            continue;
        }

        valid.push(ext);
    }

    valid
}

/// Lexically cleans a relative directory: `./a//b/` becomes `a/b`.
fn clean(dir: &str) -> String {
    let cleaned: PathBuf = Path::new(dir)
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();

    if cleaned.as_os_str().is_empty() {
        ".".into()
    } else {
        cleaned.to_string_lossy().into_owned()
    }
}
