//! Ranged, resumable archive download with exponential backoff (spec
//! §4.6).

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use datahub_config::client::RetryConfig;
use datahub_contracts::DatasetName;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::error::ClientError;

/// Drives `attempt` up to `retry.max` times, sleeping with
/// exponentially increasing delay (starting at
/// `retry.initial_backoff_seconds`, capped at
/// `retry.max_backoff_seconds`) between retryable failures.
async fn with_retry<F, Fut, T>(retry: &RetryConfig, mut attempt: F) -> Result<T, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(retry.initial_backoff_seconds.max(1)))
        .with_max_interval(Duration::from_secs(retry.max_backoff_seconds.max(1)))
        .with_multiplier(2.0)
        .with_max_elapsed_time(None)
        .build();

    let mut last_err = None;
    for attempt_no in 0..retry.max {
        match attempt(attempt_no).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt_no + 1 < retry.max => {
                let delay = backoff
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_secs(retry.max_backoff_seconds));
                tracing::warn!(
                    attempt = attempt_no,
                    error = %err,
                    delay_secs = delay.as_secs(),
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.expect("loop runs at least once since retry.max >= 1"))
}

/// Downloads (or resumes) `name`'s archive into `scratch_dir`, then
/// verifies its size against `expected_size` when the hub advertised
/// one. A size mismatch discards the partial download and retries the
/// whole transfer once more from scratch (spec §7: `SizeMismatch` ⇒
/// "discard partial, retry once"); a second mismatch is terminal.
/// Returns the path to the completed `.zip` file.
pub async fn download_archive(
    client: &reqwest::Client,
    base_url: &str,
    name: &DatasetName,
    scratch_dir: &Path,
    expected_size: Option<u64>,
    timeout: Duration,
    retry: &RetryConfig,
) -> Result<PathBuf, ClientError> {
    tokio::fs::create_dir_all(scratch_dir).await?;
    let part_path = scratch_dir.join(format!("{}.zip.part", name.as_str()));

    for size_attempt in 0..2 {
        match download_once(client, base_url, name, &part_path, timeout, retry).await {
            Ok(final_path) if expected_size.is_none() => return Ok(final_path),
            Ok(final_path) => {
                let expected = expected_size.expect("checked above");
                let actual = tokio::fs::metadata(&final_path).await?.len();
                if actual == expected {
                    return Ok(final_path);
                }
                let _ = tokio::fs::remove_file(&final_path).await;
                if size_attempt == 0 {
                    tracing::warn!(
                        dataset = name.as_str(),
                        expected,
                        actual,
                        "downloaded size mismatch, discarding partial and retrying once"
                    );
                    continue;
                }
                return Err(ClientError::SizeMismatch { expected, actual });
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("loop always returns within two iterations")
}

/// One full download-or-resume attempt: fetches `name`'s archive into
/// `part_path` (resuming via Range if a partial download exists) and
/// renames it to its final `.zip` name on success. Does not itself
/// check the advertised size — that is the outer retry-once concern
/// in [`download_archive`].
async fn download_once(
    client: &reqwest::Client,
    base_url: &str,
    name: &DatasetName,
    part_path: &Path,
    timeout: Duration,
    retry: &RetryConfig,
) -> Result<PathBuf, ClientError> {
    let final_path = part_path.with_extension("");
    let url = format!(
        "{}/package/{}.zip",
        base_url.trim_end_matches('/'),
        name.as_str()
    );

    with_retry(retry, |_attempt| {
        let url = url.clone();
        let part_path = part_path.clone();
        async move {
            let have = tokio::fs::metadata(&part_path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);

            let mut request = client.get(&url).timeout(timeout);
            if have > 0 {
                request = request.header(reqwest::header::RANGE, format!("bytes={have}-"));
            }
            let response = request.send().await.map_err(ClientError::Network)?;
            let status = response.status();

            if is_transient_status(status) {
                return Err(ClientError::NetworkTransientStatus {
                    status: status.as_u16(),
                    url: url.clone(),
                });
            }
            if status.is_client_error() && status != StatusCode::PARTIAL_CONTENT {
                return Err(ClientError::NetworkTerminal {
                    status: status.as_u16(),
                    url: url.clone(),
                });
            }

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(have > 0 && status == StatusCode::PARTIAL_CONTENT)
                .write(true)
                .truncate(!(have > 0 && status == StatusCode::PARTIAL_CONTENT))
                .open(&part_path)
                .await?;

            let mut stream = response.bytes_stream();
            use futures_util::StreamExt;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(ClientError::Network)?;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
    })
    .await?;

    tokio::fs::rename(part_path, &final_path).await?;
    Ok(final_path)
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
}
