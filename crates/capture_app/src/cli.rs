use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Save a single web page with its images, stylesheets and scripts into a
/// zip archive.
#[derive(Parser, Debug)]
#[command(name = "sitebackup", version)]
pub struct Cli {
    /// Page to capture; `https://` is assumed when no scheme is given.
    pub url: String,

    /// Capture options as JSON, e.g. '{"includeScripts": false, "maxFiles": 500}'.
    #[arg(long)]
    pub options: Option<String>,

    /// Directory the archive is written to.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of concurrent resource downloads.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Configuration file (RON). Defaults to ./sitebackup.ron when present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where log output goes.
    #[arg(long, value_enum)]
    pub log: Option<LogTarget>,

    /// Only log warnings and errors.
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for capture_logging::LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => capture_logging::LogDestination::Terminal,
            LogTarget::File => capture_logging::LogDestination::File,
            LogTarget::Both => capture_logging::LogDestination::Both,
        }
    }
}
