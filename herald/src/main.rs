mod config;

use clap::{Args, Parser};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use notifier::NotifierError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "herald";

/// Posts Jenkins build notifications to Slack.
#[derive(Parser)]
#[command(name = "herald")]
enum CliCommand {
    /// Serve the notification endpoints
    Run(RunArgs),
    /// Render one build notification to stdout as JSON
    Render(RenderArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config_file: PathBuf,
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long)]
    config_file: PathBuf,
    #[arg(long)]
    job: String,
    #[arg(long)]
    build: String,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Notifier(#[from] NotifierError),
    #[error("could not initialize metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not serialize message: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match cli_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "herald failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cli_main(cli: CliCommand) -> Result<(), CliError> {
    match cli {
        CliCommand::Run(args) => {
            let config = Config::load(&args.config_file)?;
            let _sentry = init_logging(&config.common.logging);
            if let Some(metrics) = &config.common.metrics {
                init_metrics(metrics)?;
            }

            tracing::info!("starting herald");
            runtime()?.block_on(notifier::run(config.notifier))?;
        }
        CliCommand::Render(args) => {
            let config = Config::load(&args.config_file)?;
            let _sentry = init_logging(&config.common.logging);

            let message = runtime()?.block_on(notifier::render(
                &config.notifier,
                &args.job,
                &args.build,
            ))?;
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
    }

    Ok(())
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// Installs the fmt subscriber, plus Sentry reporting when a DSN is set.
/// The returned guard flushes Sentry events on drop.
fn init_logging(logging: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let guard = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let sentry_layer = guard
        .is_some()
        .then(sentry::integrations::tracing::layer);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(sentry_layer)
        .try_init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}
