use std::process::ExitCode;

use clap::Parser;

use pixelforge::cli::{self, CliArgs};
use pixelforge::logger;
use pixelforge::settings::EditorSettings;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let settings = EditorSettings::load();

    // Verbose runs log to the terminal; otherwise keep a session log file.
    if args.verbose {
        logger::init_stderr("debug");
    } else {
        logger::init(&settings.log_level);
    }

    cli::run(args, settings).await
}
