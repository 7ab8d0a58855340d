use std::path::Path;

use freshen::cli::{self, Action};
use freshen::{config::file, error::Result, run};

fn main() -> Result<()> {
    run::init_logger();
    let args = cli::get_args();

    if args.action() == Action::Init {
        file::create_default(Path::new("."))?;
        return Ok(());
    }

    let mut config_file = file::read(&args.config_path)?;
    if let Some(tags) = &args.tags {
        config_file.override_tags(tags);
    }
    if args.verbose {
        config_file.override_verbose(true);
    }

    if args.action() == Action::PrintConfig {
        return config_file.print(&args.config_path);
    }

    run::set_verbose(config_file.verbose_logging);
    run(config_file.into_config()?)
}
