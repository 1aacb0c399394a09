use std::path::Path;

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use slipguard_archive::ExtractOptions;

use crate::cli::App;

const ENV_PREFIX: &str = "SLIPGUARD_";

/// Extraction settings after layering defaults, the config file, the
/// environment and the command line, in that order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_size: u64,
    pub allow_symlinks: bool,
    pub validate: bool,
    pub audit_symlinks: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let options = ExtractOptions::default();
        Self {
            max_size: options.max_size,
            allow_symlinks: options.allow_symlinks,
            validate: options.validate,
            audit_symlinks: options.audit_symlinks,
        }
    }
}

/// Flags given on the command line. Absent flags leave lower layers alone.
#[derive(Debug, Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audit_symlinks: Option<bool>,
}

impl From<&App> for Overrides {
    fn from(app: &App) -> Self {
        Self {
            max_size: app.max_size,
            allow_symlinks: app.allow_symlinks.then_some(true),
            validate: app.validate.then_some(true),
            audit_symlinks: app.audit_symlinks.then_some(true),
        }
    }
}

impl Settings {
    fn figment(config: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = config {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(app: &App) -> anyhow::Result<Self> {
        if let Some(path) = &app.config
            && !path.is_file()
        {
            bail!("config file not found: '{}'", path.display());
        }

        Self::figment(app.config.as_deref())
            .merge(Serialized::defaults(Overrides::from(app)))
            .extract()
            .context("invalid extraction settings")
    }

    pub fn options(&self) -> ExtractOptions {
        ExtractOptions::default()
            .max_size(self.max_size)
            .allow_symlinks(self.allow_symlinks)
            .validate(self.validate)
            .audit_symlinks(self.audit_symlinks)
    }
}
