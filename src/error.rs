use std::{error::Error as StdError, fmt, io, path::PathBuf};

pub type Result<T> = ::std::result::Result<T, Error>;

pub enum Error {
    /// Building the `Config` failed validation.
    Config(String),
    Canonicalization(PathBuf, io::Error),
    Io(io::Error),
    /// Walking the working directory failed.
    Scan(walkdir::Error),
    /// The notify backend couldn't be created or a directory couldn't be watched.
    WatchSetup(notify::Error),
    /// The build tool could not be started at all.
    BuildSpawn(String, io::Error),
    /// A build failed before the target binary ever ran.
    BuildFailed(String),
    ChildProcess(PathBuf, io::Error),
    LogFile(PathBuf, io::Error),
    Yaml(serde_yaml_ng::Error),
}

impl StdError for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::WatchSetup(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Scan(err)
    }
}

impl From<serde_yaml_ng::Error> for Error {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Error::Yaml(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} error: {}",
            match self {
                Error::Config(_) => "Config",
                Error::Canonicalization(_, _) => "Path",
                Error::Io(_) => "I/O",
                Error::Scan(_) => "Scan",
                Error::WatchSetup(_) => "Watch",
                Error::BuildSpawn(_, _) => "Build",
                Error::BuildFailed(_) => "Build",
                Error::ChildProcess(_, _) => "Process",
                Error::LogFile(_, _) => "Log file",
                Error::Yaml(_) => "YAML",
            },
            match self {
                Error::Config(msg) => msg.clone(),
                Error::Canonicalization(path, err) => {
                    format!("couldn't canonicalize '{}':\n{}", path.display(), err)
                }
                Error::Io(err) => format!("{}", err),
                Error::Scan(err) => format!("couldn't walk the working directory: {}", err),
                Error::WatchSetup(err) => format!("couldn't watch for changes: {}", err),
                Error::BuildSpawn(tool, err) => format!("couldn't start '{}': {}", tool, err),
                Error::BuildFailed(output) => {
                    format!("build failed and no previous build is running:\n{}", output)
                }
                Error::ChildProcess(path, err) => {
                    format!("couldn't run '{}': {}", path.display(), err)
                }
                Error::LogFile(path, err) => format!("'{}': {}", path.display(), err),
                Error::Yaml(err) => format!("{}", err),
            }
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn display_names_the_category() {
        let err = Error::BuildFailed("main.go:3: undefined: foo".into());
        let text = err.to_string();
        assert!(text.starts_with("Build error: "));
        assert!(text.ends_with("undefined: foo"));
    }

    #[test]
    fn debug_is_display() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(format!("{:?}", err), "I/O error: boom");
    }
}
