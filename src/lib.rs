pub mod chart;
pub mod cli;
pub mod core;
pub mod providers;
pub mod store;
pub mod web;

use crate::cli::analyze::AnalyzeOptions;
use crate::cli::clear::ClearOptions;
use crate::cli::export::ExportOptions;
use crate::cli::fetch::FetchOptions;
use crate::cli::init::InitOptions;
use crate::core::config::AppConfig;
use crate::providers::CalProvider;
use crate::store::CsvPriceStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Fetch(FetchOptions),
    Init(InitOptions),
    Funds { date: Option<NaiveDate> },
    Chart {
        fund: Option<String>,
        status: bool,
        watch: bool,
    },
    Analyze(AnalyzeOptions),
    Export(ExportOptions),
    Clear(ClearOptions),
    Serve { host: Option<String>, port: Option<u16> },
}

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("CAL fund tracker starting...");

    let config = load_config(config_path)?;
    let data_dir = config.default_data_path()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    let store = CsvPriceStore::new(data_dir);
    let provider = CalProvider::new(&config.provider)?;

    match command {
        AppCommand::Fetch(options) => cli::fetch::run(&config, &provider, &store, options).await,
        AppCommand::Init(options) => cli::init::run(&config, &provider, &store, options).await,
        AppCommand::Funds { date } => cli::funds::run(&provider, date).await,
        AppCommand::Chart {
            fund,
            status,
            watch,
        } => {
            if status {
                cli::chart::show_status(&store)
            } else if watch {
                let ctrl_c = async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                        std::future::pending::<()>().await;
                    }
                };
                cli::chart::watch(&store, cli::chart::WATCH_INTERVAL, ctrl_c).await
            } else {
                cli::chart::regenerate(&store, fund.as_deref())
            }
        }
        AppCommand::Analyze(options) => cli::analyze::run(&config, &store, options),
        AppCommand::Export(options) => cli::export::run(&config, &store, options),
        AppCommand::Clear(options) => cli::clear::run(&store, options),
        AppCommand::Serve { host, port } => {
            let mut server = config.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            web::serve(Arc::new(provider), &server).await
        }
    }
}
