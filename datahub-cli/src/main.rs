use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use datahub_client::{sync_all, ClientError};
use datahub_config::ClientConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// The DataHubSync client: fetches dataset listings from a hub and
/// keeps local directories in sync (spec §4.6, §6.6).
#[derive(Debug, Parser)]
#[command(name = "datahub", version)]
struct Args {
    /// Path to the client's TOML configuration file.
    #[arg(long, env = "DATAHUB_CONFIG", default_value = "datahub-client.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match ClientConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };

    // Held for the process lifetime: dropping it stops the non-blocking
    // file writer from flushing (spec §6.3 `logging.file`).
    let _file_guard = init_logging(&config);

    let client = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("failed to build HTTP client: {err}");
            return ExitCode::from(2);
        }
    };

    match sync_all(&client, &config).await {
        Err(err) => {
            tracing::error!(error = %err, "could not reach hub listing endpoint");
            ExitCode::from(3)
        }
        Ok(results) => {
            let mut any_failed = false;
            for (name, outcome) in &results {
                match outcome {
                    Ok(datahub_client::SyncOutcome::UpToDate) => {
                        tracing::info!(dataset = name.as_str(), "up to date")
                    }
                    Ok(datahub_client::SyncOutcome::Synced) => {
                        tracing::info!(dataset = name.as_str(), "synced")
                    }
                    Err(err) => {
                        any_failed = true;
                        log_failure(name.as_str(), err);
                    }
                }
            }
            if any_failed {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

fn log_failure(dataset: &str, err: &ClientError) {
    tracing::error!(dataset, error = %err, kind = %err.kind(), "dataset sync failed");
}

/// Always logs to stderr at `logging.level`; additionally tees to
/// `logging.file` when configured, non-blocking so a slow disk never
/// stalls the sync loop (spec §6.3). The returned guard must be held
/// for the process lifetime — dropping it stops the file writer.
fn init_logging(config: &ClientConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()))
    };

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_filter(level_filter());

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|err| panic!("could not open log file {path:?}: {err}"));
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(level_filter());

            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).init();
            None
        }
    }
}
