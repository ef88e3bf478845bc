use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use arquebus::{Config, ConfigOverrides, logging};

mod commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file [default: config/arquebus.json when present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format [compact, full, json]
    #[arg(long = "log-format", value_name = "format", global = true)]
    log_format: Option<String>,

    /// Narrative provider to use, overriding the configuration
    #[arg(long, global = true)]
    provider: Option<String>,

    /// API key for the selected narrative provider
    #[arg(
        long = "api-key",
        value_name = "key",
        env = "ARQUEBUS_API_KEY",
        hide_env_values = true,
        global = true
    )]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metrics from a result log (CSV or XML)
    Metrics {
        /// Result log file
        #[arg(long)]
        input: PathBuf,

        /// Output file
        #[arg(long, default_value = "stdout")]
        output: String,

        /// Report type to generate [text, json]
        #[arg(long = "type", default_value = "text")]
        report_type: String,
    },

    /// Extract the dashboard tables of a generated HTML report as JSON
    Dashboard {
        /// The report's index.html
        #[arg(long)]
        input: PathBuf,

        /// Output file
        #[arg(long, default_value = "stdout")]
        output: String,
    },

    /// Make sure a run's report directory holds a usable index.html
    Report {
        /// Directory of the run's HTML report
        #[arg(long = "report-dir", value_name = "dir")]
        report_dir: PathBuf,

        /// Result log of the run
        #[arg(long = "result-log", value_name = "file")]
        result_log: Option<PathBuf>,

        /// Test name used in titles [default: report directory name]
        #[arg(long)]
        name: Option<String>,
    },

    /// Write an analysis report for a summary page and link it from there
    Analyze {
        /// Summary page [default: newest *_summary_*.html under the reports directory]
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Narrative service timeout per attempt
        #[arg(long)]
        timeout: Option<humantime::Duration>,
    },

    /// Link an existing analysis report from a summary page
    Patch {
        /// Summary page to patch
        #[arg(long)]
        summary: PathBuf,

        /// Link target, usually the analysis report's file name
        #[arg(long)]
        link: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    logging::init(&config.logging, cli.verbose).context("Failed to initialise logging")?;
    match &config.source {
        Some(path) => info!(path = %path.display(), provider = %config.ai.provider, "Loaded configuration"),
        None => debug!("No config file, using defaults"),
    }

    let timeout: Option<Duration> = match &cli.command {
        Commands::Analyze {
            timeout: Some(t), ..
        } => Some((*t).into()),
        _ => None,
    };
    config.apply(ConfigOverrides {
        provider: cli.provider,
        api_key: cli.api_key,
        timeout,
    });

    match cli.command {
        Commands::Metrics {
            input,
            output,
            report_type,
        } => {
            commands::metrics::run(&config, input, output, report_type).await?;
        }
        Commands::Dashboard { input, output } => {
            commands::dashboard::run(input, output).await?;
        }
        Commands::Report {
            report_dir,
            result_log,
            name,
        } => {
            commands::report::run(&config, report_dir, result_log, name).await?;
        }
        Commands::Analyze { summary, .. } => {
            commands::analyze::run(&config, summary).await?;
        }
        Commands::Patch { summary, link } => {
            commands::patch::run(summary, link).await?;
        }
    }

    Ok(())
}
