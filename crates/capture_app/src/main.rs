mod cli;
mod config;
mod observer;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use capture_engine::{ApiResponse, CaptureService};
use capture_logging::{capture_debug, capture_info, capture_warn};
use clap::Parser;
use log::LevelFilter;

use crate::cli::Cli;
use crate::config::{describe, AppConfig};
use crate::observer::LoggingObserver;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let level = if cli.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    capture_logging::initialize(config.log_target(&cli).into(), level, None);
    capture_debug!("file config:\n{}", describe(&config));

    let engine_config = config.engine_config(&cli);
    capture_info!("archives go to {}", engine_config.output_dir.display());
    let service = Arc::new(CaptureService::new(engine_config));
    service.set_progress_observer(Some(Arc::new(LoggingObserver::default())));

    let interrupt = {
        let service = service.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                capture_warn!("interrupted, stopping capture");
                service.stop_capture();
            }
        })
    };

    let outcome = service
        .capture_page(&cli.url, &config.options_json(&cli))
        .await;
    interrupt.abort();

    let (envelope, code) = match outcome {
        Ok(result) => (
            ApiResponse::ok("capture completed", Some(result)).to_json(),
            ExitCode::SUCCESS,
        ),
        Err(err) => (ApiResponse::from_error(&err).to_json(), ExitCode::FAILURE),
    };
    println!("{envelope}");
    Ok(code)
}
