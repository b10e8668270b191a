//! Implementation of the `wbstack config` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    config: Config,
    #[serde(skip)]
    yaml: String,
}

impl ConfigOutput {
    pub fn new(config: Config) -> Result<Self> {
        let yaml = serde_yaml::to_string(&config).context("Failed to render configuration as YAML")?;
        Ok(Self { config, yaml })
    }
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        self.yaml.trim_end().to_string()
    }
}

pub fn execute(_args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    output(&ConfigOutput::new(config.clone())?, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_output_is_yaml() {
        let out = ConfigOutput::new(Config::default()).expect("render");
        let parsed: Config = serde_yaml::from_str(&out.to_human()).expect("parse back");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_json_output_has_sections() {
        let json = ConfigOutput::new(Config::default()).expect("render").to_json();
        assert_eq!(json["logging"]["level"], "info");
        assert!(json["previewer"]["control_period"].is_number());
    }
}
