//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::{config::ConfigArgs, preview::PreviewArgs};

#[derive(Parser, Debug)]
#[command(name = "wbstack")]
#[command(about = "wbstack - whole-body task stack previewer", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .wbstack/config.yaml and .wbstack/local.yaml)
    #[arg(short, long, global = true, env = "WBSTACK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate the demo arm stack and report failed instants
    Preview(PreviewArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}
