use anyhow::Result;
use calfund::cli::analyze::AnalyzeOptions;
use calfund::cli::clear::ClearOptions;
use calfund::cli::export::ExportOptions;
use calfund::cli::fetch::FetchOptions;
use calfund::cli::init::InitOptions;
use calfund::core::dates::parse_date;
use calfund::core::log::init_logging;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for calfund::AppCommand {
    fn from(cmd: Commands) -> calfund::AppCommand {
        match cmd {
            Commands::Fetch {
                fund,
                start,
                end,
                delay,
                no_save,
            } => calfund::AppCommand::Fetch(FetchOptions {
                fund,
                start,
                end,
                delay,
                no_save,
            }),
            Commands::Init { start, end, delay } => {
                calfund::AppCommand::Init(InitOptions { start, end, delay })
            }
            Commands::Funds { date } => calfund::AppCommand::Funds { date },
            Commands::Chart {
                fund,
                status,
                watch,
            } => calfund::AppCommand::Chart {
                fund,
                status,
                watch,
            },
            Commands::Analyze {
                fund,
                start,
                end,
                preset,
                compare,
                json,
            } => calfund::AppCommand::Analyze(AnalyzeOptions {
                fund,
                start,
                end,
                preset,
                compare,
                json,
            }),
            Commands::Export {
                fund,
                start,
                end,
                output,
            } => calfund::AppCommand::Export(ExportOptions {
                fund,
                start,
                end,
                output,
            }),
            Commands::Clear { fund, yes } => calfund::AppCommand::Clear(ClearOptions { fund, yes }),
            Commands::Serve { host, port } => calfund::AppCommand::Serve { host, port },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch price history for one fund (prompts for anything not given)
    Fetch {
        /// Exact fund name
        #[arg(short, long)]
        fund: Option<String>,
        /// First date of the range (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        /// Last date of the range (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Seconds to wait between requests
        #[arg(short, long)]
        delay: Option<f64>,
        /// Keep fetched prices in memory only
        #[arg(long)]
        no_save: bool,
    },
    /// Build the price cache for every fund in one pass
    Init {
        #[arg(short, long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        #[arg(short, long, value_parser = parse_date)]
        end: Option<NaiveDate>,
        #[arg(short, long)]
        delay: Option<f64>,
    },
    /// List the funds published for a date
    Funds {
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Regenerate price charts from the cache
    Chart {
        /// Only this fund
        #[arg(short, long)]
        fund: Option<String>,
        /// Show which charts are stale instead of regenerating
        #[arg(long, conflicts_with = "watch")]
        status: bool,
        /// Keep running and redraw charts whenever a price cache changes
        #[arg(short, long, conflicts_with = "fund")]
        watch: bool,
    },
    /// Analyze cached prices against market context
    Analyze {
        #[arg(short, long)]
        fund: Option<String>,
        #[arg(short, long, value_parser = parse_date, conflicts_with = "preset")]
        start: Option<NaiveDate>,
        #[arg(short, long, value_parser = parse_date, conflicts_with = "preset")]
        end: Option<NaiveDate>,
        /// crisis, recovery or recent
        #[arg(short, long)]
        preset: Option<String>,
        /// Also compare against this preset's window
        #[arg(long)]
        compare: Option<String>,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export one fund's cached prices as a Date,Price CSV
    Export {
        #[arg(short, long)]
        fund: Option<String>,
        #[arg(short, long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        #[arg(short, long, value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Output file (default: <fund>_data.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete cached prices and charts
    Clear {
        /// Only this fund
        #[arg(short, long)]
        fund: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Serve the JSON fund API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => calfund::cli::setup::setup(),
        Some(cmd) => calfund::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            calfund::run_command(
                calfund::AppCommand::Fetch(FetchOptions::default()),
                cli.config_path.as_deref(),
            )
            .await
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
