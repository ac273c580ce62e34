use std::process::ExitCode;

use clap::Parser;

use studioplay::cli::{self, Cli};
use studioplay::logger;
use studioplay::settings::EngineSettings;

fn main() -> ExitCode {
    let args = Cli::parse();

    let settings = EngineSettings::load();
    let level = if args.output.verbose { log::LevelFilter::Debug } else { settings.log_level };

    // Initialize session log (overwrites previous session log)
    logger::init(level);
    log::info!("studioplay {} starting", env!("CARGO_PKG_VERSION"));

    cli::run(args, settings)
}
