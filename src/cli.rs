use clap::{App, Arg};

use crate::config::file::DEFAULT_FILE_NAME;

#[derive(Debug)]
pub struct Args {
    pub config_path: String,
    pub init: bool,
    pub print_config: bool,
    pub tags: Option<String>,
    pub verbose: bool,
}

/// What a single invocation does.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Write the default config file and exit.
    Init,
    /// Print the config as understood and exit.
    PrintConfig,
    Run,
}

impl Args {
    pub const fn action(&self) -> Action {
        if self.init {
            Action::Init
        } else if self.print_config {
            Action::PrintConfig
        } else {
            Action::Run
        }
    }
}

fn app() -> App<'static, 'static> {
    App::new("freshen")
        .version(crate_version!())
        .about("Rebuilds and reruns a Go program when its sources change")
        .arg(
            Arg::with_name("config")
                .help("Path to the config file")
                .short("c")
                .long("config")
                .takes_value(true)
                .value_name("path"),
        )
        .arg(
            Arg::with_name("init")
                .help("Write a default config file to the current directory")
                .long("init"),
        )
        .arg(
            Arg::with_name("print-config")
                .help("Print the config as understood and exit")
                .long("print-config"),
        )
        .arg(
            Arg::with_name("tags")
                .help("Build tags passed to the build tool, overriding GoTags")
                .long("tags")
                .takes_value(true)
                .value_name("tags"),
        )
        .arg(
            Arg::with_name("verbose")
                .help("Print debugging messages")
                .short("v")
                .long("verbose"),
        )
}

pub fn get_args() -> Args {
    args_from(std::env::args_os())
}

fn args_from<I, T>(argv: I) -> Args
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = app().get_matches_from(argv);

    let config_path = args
        .value_of("config")
        .map_or_else(|| format!("./{}", DEFAULT_FILE_NAME), str::to_string);

    Args {
        config_path,
        init: args.is_present("init"),
        print_config: args.is_present("print-config"),
        tags: args.value_of("tags").map(str::to_string),
        verbose: args.is_present("verbose"),
    }
}
