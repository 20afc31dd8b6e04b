//! Producer loop driving Detector → Packager → State on a timer (spec
//! §4.3).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use datahub_config::hub::DatasetConfig;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::detector;
use crate::packager::Packager;
use crate::state_store::{DatasetStateUpdate, StateStore};

pub struct Scheduler {
    datasets: Vec<DatasetConfig>,
    state: Arc<StateStore>,
    packager: Arc<Packager>,
    cache_dir: std::path::PathBuf,
    keep_versions: usize,
    interval: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        datasets: Vec<DatasetConfig>,
        state: Arc<StateStore>,
        packager: Arc<Packager>,
        cache_dir: std::path::PathBuf,
        keep_versions: usize,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            datasets,
            state,
            packager,
            cache_dir,
            keep_versions,
            interval,
            cancel,
        }
    }

    /// Runs until the cancellation token fires. Cancellation is
    /// honored promptly at every suspension point (tick wait and
    /// debounce sleep), per spec §5.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
            }
        }
    }

    async fn run_tick(&self) {
        for dataset in &self.datasets {
            if self.cancel.is_cancelled() {
                return;
            }
            if let Err(err) = self.process_dataset(dataset).await {
                error!(dataset = dataset.name.as_str(), error = %err, "dataset processing failed");
            }
        }
    }

    async fn process_dataset(&self, dataset: &DatasetConfig) -> Result<(), crate::error::CoreError> {
        let current = self.state.get(&dataset.name).await;
        let last_updated = current.as_ref().map(|s| s.last_updated);

        let first = detector::scan(&dataset.source_path, last_updated);
        if !first.is_fresh(dataset.newer_ratio_threshold) {
            debug!(dataset = dataset.name.as_str(), ratio = first.newer_ratio, "not fresh");
            return Ok(());
        }

        let last_trigger_at = current.as_ref().map(|s| s.last_trigger_at);
        if let Some(last_trigger_at) = last_trigger_at {
            let elapsed = Utc::now().fixed_offset() - last_trigger_at;
            if elapsed < chrono::Duration::seconds(dataset.debounce_seconds as i64) {
                debug!(dataset = dataset.name.as_str(), "within debounce window, deferring");
                return Ok(());
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            _ = sleep(Duration::from_secs(dataset.debounce_seconds)) => {}
        }

        let second = detector::scan(&dataset.source_path, last_updated);
        if !first.agrees_with(&second) {
            debug!(dataset = dataset.name.as_str(), "debounce scans disagree, deferring");
            return Ok(());
        }

        let majority_minute = match second.majority_minute {
            Some(m) => m,
            None => return Ok(()),
        };
        if Some(majority_minute) == last_updated {
            debug!(dataset = dataset.name.as_str(), "majority-minute unchanged, no-op");
            return Ok(());
        }

        let result = self
            .packager
            .package(
                &dataset.name,
                dataset.source_path.clone(),
                self.cache_dir.clone(),
                majority_minute,
                self.keep_versions,
            )
            .await?;

        let now = Utc::now().fixed_offset();
        self.state
            .update(
                &dataset.name,
                DatasetStateUpdate {
                    last_updated: majority_minute,
                    file_count: result.file_count,
                    total_size: result.uncompressed_size,
                    package_size: result.compressed_size,
                    package_path: result.archive_path,
                    last_trigger_at: now,
                },
            )
            .await?;

        info!(dataset = dataset.name.as_str(), last_updated = %majority_minute, "dataset packaged");
        Ok(())
    }
}
