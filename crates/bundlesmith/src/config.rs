//! Build configuration file
//!
//! A TOML document with an `[options]` table and one `[[bundles]]` entry per
//! bundle to generate.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{bundle_definition::BundleDefinition, code_generator::BuildOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub options: BuildOptions,
    pub bundles: Vec<BundleDefinition>,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid configuration {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        for (index, bundle) in self.bundles.iter().enumerate() {
            if bundle.name.is_empty() {
                bail!("Bundle #{index} has no name");
            }
        }
        Ok(())
    }
}
