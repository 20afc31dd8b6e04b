//! Client sync engine orchestration (spec §4.6).

use std::path::PathBuf;
use std::time::Duration;

use datahub_config::client::{ClientConfig, ClientDatasetConfig};
use datahub_contracts::{DatasetListing, DatasetName};
use rand::Rng;

use crate::download::download_archive;
use crate::error::ClientError;
use crate::extract::extract_archive;
use crate::state::ClientState;
use crate::swap::swap_in;

/// Outcome of syncing one dataset, returned per-dataset so a batch run
/// can isolate failures (spec §4.6 closing paragraph).
#[derive(Debug)]
pub enum SyncOutcome {
    UpToDate,
    Synced,
}

pub async fn sync_dataset(
    client: &reqwest::Client,
    config: &ClientConfig,
    dataset: &ClientDatasetConfig,
    listing: &DatasetListing,
    state: &mut ClientState,
) -> Result<SyncOutcome, ClientError> {
    let remote = listing
        .find(&dataset.name)
        .ok_or_else(|| ClientError::DatasetUnknown(dataset.name.as_str().to_string()))?;

    let local_last_updated = state.last_updated(&dataset.name);
    if let Some(local) = local_last_updated {
        if remote.last_updated <= local {
            return Ok(SyncOutcome::UpToDate);
        }
    }

    let scratch_dir = dataset.scratch_dir(config.scratch_dir.as_deref());
    let expected_size = (remote.package_size > 0).then_some(remote.package_size);

    let archive_path = download_archive(
        client,
        &config.hub.url,
        &dataset.name,
        &scratch_dir,
        expected_size,
        config.hub.timeout,
        &config.retries,
    )
    .await?;

    let staging_dir = staging_sibling(&dataset.local_dir);
    extract_archive(&archive_path, &staging_dir)?;
    swap_in(&staging_dir, &dataset.local_dir).await?;

    state.set(&dataset.name, remote.last_updated);
    state.persist(&config.state_file).await?;

    let _ = tokio::fs::remove_file(&archive_path).await;

    Ok(SyncOutcome::Synced)
}

/// Runs every configured dataset against one fetched listing,
/// isolating failures per-dataset rather than aborting the batch.
pub async fn sync_all(
    client: &reqwest::Client,
    config: &ClientConfig,
) -> Result<Vec<(DatasetName, Result<SyncOutcome, ClientError>)>, ClientError> {
    let listing = fetch_listing(client, &config.hub.url, Duration::from_secs(30)).await?;
    let mut state = ClientState::load(&config.state_file).await?;

    let mut results = Vec::with_capacity(config.datasets.len());
    for dataset in &config.datasets {
        let outcome = sync_dataset(client, config, dataset, &listing, &mut state).await;
        if let Err(err) = &outcome {
            tracing::error!(dataset = dataset.name.as_str(), error = %err, "dataset sync failed");
        }
        results.push((dataset.name.clone(), outcome));
    }

    Ok(results)
}

async fn fetch_listing(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Result<DatasetListing, ClientError> {
    let url = format!("{}/api/datasets", base_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .timeout(timeout)
        .send()
        .await
        .map_err(ClientError::Network)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::NetworkTerminal {
            status: status.as_u16(),
            url,
        });
    }

    response.json().await.map_err(ClientError::Network)
}

fn staging_sibling(local_dir: &std::path::Path) -> PathBuf {
    let pid = std::process::id();
    let rand_suffix: u32 = rand::thread_rng().gen();
    let mut name = local_dir.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".staging-{pid}-{rand_suffix:08x}"));
    local_dir.with_file_name(name)
}
