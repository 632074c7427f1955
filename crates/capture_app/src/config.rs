use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use capture_engine::EngineConfig;
use capture_logging::capture_debug;
use serde::{Deserialize, Serialize};

use crate::cli::{Cli, LogTarget};

pub const DEFAULT_CONFIG_FILE: &str = "sitebackup.ron";

/// Settings read from `sitebackup.ron`. Every field is optional; command-line
/// flags win over file values, and engine defaults fill the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub user_agent: Option<String>,
    pub log: Option<LogTarget>,
    /// Capture options JSON used when `--options` is not given.
    pub options: Option<String>,
}

impl AppConfig {
    /// Load `explicit` (which must exist) or `./sitebackup.ron` (which may not).
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()));
            }
        };
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn log_target(&self, cli: &Cli) -> LogTarget {
        cli.log.or(self.log).unwrap_or_default()
    }

    pub fn options_json(&self, cli: &Cli) -> String {
        cli.options
            .clone()
            .or_else(|| self.options.clone())
            .unwrap_or_default()
    }

    pub fn engine_config(&self, cli: &Cli) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(dir) = cli.output.clone().or_else(|| self.output_dir.clone()) {
            config.output_dir = dir;
        }
        if let Some(n) = cli.concurrency.map(usize::from).or(self.concurrency) {
            config.concurrency = n.max(1);
        }
        if let Some(agent) = &self.user_agent {
            config.user_agent = agent.clone();
        }
        capture_debug!("engine config: {:?}", config);
        config
    }
}

/// Pretty RON rendering of a file configuration.
pub fn describe(config: &AppConfig) -> String {
    let pretty = ron::ser::PrettyConfig::new();
    match ron::ser::to_string_pretty(config, pretty) {
        Ok(text) => text,
        Err(err) => {
            capture_debug!("config not printable: {}", err);
            String::new()
        }
    }
}
