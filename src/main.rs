//! wbstack CLI entry point.

use clap::Parser;

use wbstack::cli::{self, Cli, Commands};
use wbstack::infrastructure::{LogConfig, LoggerImpl};

fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Preview(args) => cli::commands::preview::execute(args, &config, cli.json),
        Commands::Config(args) => cli::commands::config::execute(args, &config, cli.json),
    };

    if let Err(err) = result {
        cli::handle_error(err, cli.json);
    }
}
