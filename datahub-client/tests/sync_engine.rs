//! End-to-end exercise of `sync_dataset`/`sync_all` against a real
//! hub server (spec §8 scenarios 1 "cold start" and 2 "idempotent
//! resync"): a genuine archive produced by `datahub-core`'s packager,
//! served by the genuine `datahub-server` router, fetched and
//! installed by this crate's sync engine.

use std::fs;
use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use datahub_client::{sync_all, sync_dataset, SyncOutcome};
use datahub_config::client::{ClientConfig, ClientDatasetConfig, HubConnection, RetryConfig, LoggingConfig};
use datahub_contracts::DatasetName;
use datahub_core::packager::Packager;
use datahub_core::state_store::{DatasetStateUpdate, StateStore};
use datahub_server::routes::create_app;
use datahub_server::state::AppState;

async fn spawn_hub(store: Arc<StateStore>) -> String {
    let app = create_app(AppState { store });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn seed_source_dir(file_count: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..file_count {
        let mut f = fs::File::create(dir.path().join(format!("f{i}.csv"))).unwrap();
        writeln!(f, "a,b\n1,2").unwrap();
    }
    dir
}

fn client_config(hub_url: String, local_dir: std::path::PathBuf, state_file: std::path::PathBuf) -> ClientConfig {
    ClientConfig {
        hub: HubConnection {
            url: hub_url,
            timeout: std::time::Duration::from_secs(30),
        },
        datasets: vec![ClientDatasetConfig {
            name: DatasetName::new("trades").unwrap(),
            local_dir,
        }],
        retries: RetryConfig::default(),
        state_file,
        scratch_dir: None,
        logging: LoggingConfig::default(),
    }
}

#[tokio::test]
async fn cold_start_then_idempotent_resync() {
    let name = DatasetName::new("trades").unwrap();

    // Build a real archive the way the Scheduler would.
    let source = seed_source_dir(5);
    let cache = tempfile::tempdir().unwrap();
    let packager = Packager::new();
    let majority_minute = Utc::now().fixed_offset();
    let package = packager
        .package(&name, source.path().to_path_buf(), cache.path().to_path_buf(), majority_minute, 2)
        .await
        .unwrap();

    let state_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::load(state_dir.path().join("state.json")).await.unwrap());
    store
        .update(
            &name,
            DatasetStateUpdate {
                last_updated: majority_minute,
                file_count: package.file_count,
                total_size: package.uncompressed_size,
                package_size: package.compressed_size,
                package_path: package.archive_path.clone(),
                last_trigger_at: Utc::now().fixed_offset(),
            },
        )
        .await
        .unwrap();

    let hub_url = spawn_hub(Arc::clone(&store)).await;

    let workdir = tempfile::tempdir().unwrap();
    let local_dir = workdir.path().join("trades");
    let config = client_config(
        hub_url,
        local_dir.clone(),
        workdir.path().join("client-state.json"),
    );

    let client = reqwest::Client::new();
    let results = sync_all(&client, &config).await.unwrap();
    assert_eq!(results.len(), 1);
    let (dataset_name, outcome) = &results[0];
    assert_eq!(dataset_name.as_str(), "trades");
    assert!(matches!(outcome, Ok(SyncOutcome::Synced)));

    let mut entries: Vec<_> = fs::read_dir(&local_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["f0.csv", "f1.csv", "f2.csv", "f3.csv", "f4.csv"]);

    // Second sync against the same listing: no new bytes, UpToDate.
    let results_again = sync_all(&client, &config).await.unwrap();
    assert!(matches!(results_again[0].1, Ok(SyncOutcome::UpToDate)));
}

#[tokio::test]
async fn sync_dataset_reports_unknown_for_unconfigured_name() {
    let state_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::load(state_dir.path().join("state.json")).await.unwrap());
    let hub_url = spawn_hub(Arc::clone(&store)).await;

    let workdir = tempfile::tempdir().unwrap();
    let config = client_config(
        hub_url.clone(),
        workdir.path().join("trades"),
        workdir.path().join("client-state.json"),
    );

    let client = reqwest::Client::new();
    let listing: datahub_contracts::DatasetListing = client
        .get(format!("{hub_url}/api/datasets"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listing.datasets.is_empty());

    let mut state = datahub_client::ClientState::load(&config.state_file).await.unwrap();
    let result = sync_dataset(
        &client,
        &config,
        &config.datasets[0],
        &listing,
        &mut state,
    )
    .await;
    assert!(matches!(result, Err(datahub_client::ClientError::DatasetUnknown(_))));
}
