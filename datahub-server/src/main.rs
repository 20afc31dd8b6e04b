use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use datahub_config::HubConfig;
use datahub_core::{Packager, Scheduler, StateStore};
use datahub_server::routes::create_app;
use datahub_server::state::AppState;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Spec §5: in-flight downloads drain for up to this long after a
/// shutdown signal before the listener is forced closed.
const SHUTDOWN_DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// The DataHubSync hub: watches dataset source directories, packages
/// settled versions, and serves them over HTTP.
#[derive(Debug, Parser)]
#[command(name = "datahub-hub", version)]
struct Args {
    /// Path to the hub's TOML configuration file.
    #[arg(long, env = "DATAHUB_CONFIG", default_value = "datahub-hub.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    let config = HubConfig::load(&args.config).map_err(|err| {
        tracing::error!(error = %err, "configuration invalid");
        err
    })?;
    config.ensure_directories()?;

    let state_file = if config.state_file.is_absolute() {
        config.state_file.clone()
    } else {
        config.server.data_root.join(&config.state_file)
    };
    let store = Arc::new(StateStore::load(state_file).await?);

    let cancel = CancellationToken::new();
    let scheduler = Arc::new(Scheduler::new(
        config.datasets.clone(),
        Arc::clone(&store),
        Arc::new(Packager::new()),
        config.server.cache_dir.clone(),
        config.packaging.keep_versions,
        std::time::Duration::from_secs(config.scheduler.interval_minutes * 60),
        cancel.clone(),
    ));
    let scheduler_handle = tokio::spawn(Arc::clone(&scheduler).run());

    let app = create_app(AppState { store });
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "datahub hub listening");

    let shutdown_cancel = cancel.clone();
    let mut serve_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown_cancel))
            .await
    });

    cancel.cancelled().await;
    match tokio::time::timeout(SHUTDOWN_DRAIN_DEADLINE, &mut serve_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => tracing::error!(error = %err, "http server exited with error"),
        Ok(Err(join_err)) => tracing::error!(error = %join_err, "http server task panicked"),
        Err(_) => {
            tracing::warn!(
                deadline_secs = SHUTDOWN_DRAIN_DEADLINE.as_secs(),
                "graceful shutdown deadline elapsed, forcing remaining connections closed"
            );
            serve_task.abort();
        }
    }

    cancel.cancel();
    let _ = scheduler_handle.await;
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
    cancel.cancel();
}
