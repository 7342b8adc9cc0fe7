use clap::{CommandFactory, Parser};
use magento_config_exporter::{error, run_export, Cli};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if let Err(err) = run_export(&cli) {
        error(&err.to_string());
        if err.shows_usage() {
            let _ = Cli::command().print_help();
        }
        std::process::exit(1);
    }
}
