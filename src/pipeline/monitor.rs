// src/pipeline/monitor.rs

//! The observation loop.
//!
//! Each cycle runs fetch → extract → detect → persist → notify to completion
//! before the next one may start. Cycles start on a fixed interval measured
//! start-to-start; a cycle that overruns the interval is followed
//! immediately by the next one, never overlapped by it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{Config, ExtractionMode, ObservationResult, ObservationStatus, Snapshot};
use crate::notify::Notifier;
use crate::services::{ContentExtractor, Fetcher};
use crate::storage::SnapshotStore;
use crate::utils::excerpt;

use super::detect::{ChangeDetector, ChangeOutcome};

/// Summary of a monitoring run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Status of every completed cycle, in order
    pub statuses: Vec<ObservationStatus>,
    /// Stopped by the cancellation token rather than the cycle limit
    pub cancelled: bool,
    /// The last accepted snapshot could not be saved
    pub persistence_degraded: bool,
}

impl RunSummary {
    pub fn cycles(&self) -> usize {
        self.statuses.len()
    }

    pub fn count(&self, status: ObservationStatus) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }

    /// `(label, count)` pairs for every status that occurred.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        ObservationStatus::ALL
            .iter()
            .map(|status| (status.as_str(), self.count(*status)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

/// Drives the observation loop for one URL.
///
/// The monitor is the only owner of the current snapshot and the only caller
/// of [`SnapshotStore::save`].
pub struct Monitor {
    url: String,
    interval: Duration,
    cycle_limit: Option<u64>,
    mode: ExtractionMode,
    excerpt_length: usize,
    fetcher: Arc<dyn Fetcher>,
    extractor: ContentExtractor,
    detector: ChangeDetector,
    store: Arc<dyn SnapshotStore>,
    notifier: Notifier,
    snapshot: Option<Snapshot>,
    persistence_degraded: bool,
    last_checked: Option<DateTime<Utc>>,
}

impl Monitor {
    /// Build a monitor and load the persisted snapshot.
    ///
    /// Fails if the configuration is unusable or the store cannot be read.
    pub async fn new(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn SnapshotStore>,
        notifier: Notifier,
    ) -> Result<Self> {
        config.validate()?;
        let extractor = ContentExtractor::new(config.monitor.selector.as_deref())?;
        let detector = ChangeDetector::from_config(&config.detection)?;
        let snapshot = store.load().await?;

        match &snapshot {
            Some(s) => log::info!(
                "Resuming from snapshot captured {} ({} lines)",
                s.observed_at.format("%Y-%m-%d %H:%M:%S"),
                s.canonical_text.lines().count()
            ),
            None => log::info!("No previous snapshot, first cycle will capture one"),
        }

        Ok(Self {
            url: config.target_url().to_string(),
            interval: config.interval(),
            cycle_limit: config.cycle_limit(),
            mode: config.monitor.extraction,
            excerpt_length: config.detection.excerpt_length,
            fetcher,
            extractor,
            detector,
            store,
            notifier,
            snapshot,
            persistence_degraded: false,
            last_checked: None,
        })
    }

    /// The snapshot currently in effect.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// When the last cycle started.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    /// Run cycles until the cycle limit is reached or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> RunSummary {
        log::info!("Starting to monitor {}", self.url);
        log::info!("Checking every {} seconds", self.interval.as_secs());
        if let Some(limit) = self.cycle_limit {
            log::info!("Test mode: stopping after {} cycles", limit);
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = RunSummary::default();
        let mut cycle: u64 = 0;

        loop {
            if self.cycle_limit.is_some_and(|limit| cycle >= limit) {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                _ = ticker.tick() => {}
            }

            cycle += 1;
            match self.run_cycle(cycle, &cancel).await {
                Some(result) => summary.statuses.push(result.status),
                None => {
                    summary.cancelled = true;
                    break;
                }
            }
        }

        summary.persistence_degraded = self.persistence_degraded;
        log::info!("Monitoring stopped after {} cycles", summary.cycles());
        summary
    }

    /// Run one cycle. Returns `None` if `cancel` fired while the page was
    /// being fetched, in which case nothing was persisted or notified.
    pub async fn run_cycle(
        &mut self,
        cycle: u64,
        cancel: &CancellationToken,
    ) -> Option<ObservationResult> {
        let checked_at = Utc::now();
        self.last_checked = Some(checked_at);

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("Cycle {} abandoned: shutdown requested during fetch", cycle);
                return None;
            }
            fetched = self.fetcher.fetch(&self.url) => fetched,
        };

        let result = match fetched {
            Err(error) => ObservationResult::fetch_failed(cycle, checked_at, &error),
            Ok(bytes) => match self.extractor.extract(&bytes, self.mode) {
                Err(error) => ObservationResult::extract_failed(cycle, checked_at, &error),
                Ok(text) => self.accept(cycle, checked_at, &text).await,
            },
        };

        self.notifier.dispatch(&result);
        Some(result)
    }

    /// Detect changes in freshly extracted text and persist the outcome.
    async fn accept(
        &mut self,
        cycle: u64,
        checked_at: DateTime<Utc>,
        text: &str,
    ) -> ObservationResult {
        let previous = self.snapshot.take();
        let detection = self.detector.detect(text, previous, checked_at);

        // A snapshot that failed to save earlier is retried even when unchanged.
        let persist_error = if detection.needs_persist() || self.persistence_degraded {
            self.persist(&detection.snapshot).await
        } else {
            None
        };

        let snapshot = &detection.snapshot;
        let result = match detection.outcome {
            ChangeOutcome::FirstObservation => ObservationResult::first_observation(
                cycle,
                checked_at,
                &snapshot.fingerprint,
                excerpt(&snapshot.canonical_text, self.excerpt_length),
            ),
            ChangeOutcome::Unchanged => {
                ObservationResult::unchanged(cycle, checked_at, &snapshot.fingerprint)
            }
            ChangeOutcome::Changed(diff) => ObservationResult::changed(
                cycle,
                checked_at,
                &snapshot.fingerprint,
                diff,
                excerpt(&snapshot.canonical_text, self.excerpt_length),
            ),
        };
        self.snapshot = Some(detection.snapshot);

        match persist_error {
            Some(error) => result.with_persist_error(error),
            None => result,
        }
    }

    /// Save `snapshot`, returning the error message on failure.
    async fn persist(&mut self, snapshot: &Snapshot) -> Option<String> {
        match self.store.save(snapshot).await {
            Ok(()) => {
                if self.persistence_degraded {
                    log::info!("Snapshot persistence restored");
                }
                self.persistence_degraded = false;
                None
            }
            Err(error) => {
                log::error!("Failed to persist snapshot: {}", error);
                self.persistence_degraded = true;
                Some(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::{AppError, FetchError};
    use crate::notify::NotificationSink;
    use crate::storage::MemoryStore;

    /// Serves canned responses in order, repeating the last one.
    struct ScriptedFetcher {
        responses: Vec<std::result::Result<&'static str, FetchError>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<std::result::Result<&'static str, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let index = call.min(self.responses.len() - 1);
            self.responses[index]
                .clone()
                .map(|page| page.as_bytes().to_vec())
        }
    }

    /// Never completes.
    struct HangingFetcher;

    #[async_trait]
    impl Fetcher for HangingFetcher {
        async fn fetch(&self, _url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            std::future::pending().await
        }
    }

    /// Fails the first `failures` saves, then delegates to memory.
    struct FlakyStore {
        failures: AtomicUsize,
        saves: AtomicUsize,
        inner: MemoryStore,
    }

    #[async_trait]
    impl SnapshotStore for FlakyStore {
        async fn load(&self) -> Result<Option<Snapshot>> {
            self.inner.load().await
        }

        async fn save(&self, snapshot: &Snapshot) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::store("disk full"));
            }
            self.inner.save(snapshot).await
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<ObservationResult>>>);

    impl Recorder {
        fn results(&self) -> Vec<ObservationResult> {
            self.0.lock().unwrap().clone()
        }
    }

    impl NotificationSink for Recorder {
        fn notify(&self, result: &ObservationResult) {
            self.0.lock().unwrap().push(result.clone());
        }
    }

    const PAGE_V1: &str = "<html><body><h1>Example Domain</h1><p>Version one.</p></body></html>";
    const PAGE_V1_REFLOWED: &str =
        "<html><body>\n  <h1>Example   Domain</h1>\n\n  <p>Version\n one.</p>\n</body></html>";
    const PAGE_V2: &str = "<html><body><h1>Example Domain</h1><p>Version two.</p></body></html>";

    fn test_config(cycles: u64) -> Config {
        let mut config = Config::default();
        config.monitor.url = Some("https://example.com".to_string());
        config.monitor.interval_secs = 10;
        config.monitor.test_mode = true;
        config.monitor.test_cycles = cycles;
        config
    }

    async fn monitor_with(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn SnapshotStore>,
        recorder: &Recorder,
    ) -> Monitor {
        let notifier = Notifier::new().with_sink(recorder.clone());
        Monitor::new(config, fetcher, store, notifier).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_content_is_first_then_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &test_config(2),
            ScriptedFetcher::new(vec![Ok(PAGE_V1)]),
            store.clone(),
            &recorder,
        )
        .await;

        let summary = monitor.run(CancellationToken::new()).await;

        assert_eq!(
            summary.statuses,
            vec![ObservationStatus::FirstObservation, ObservationStatus::Unchanged]
        );
        assert!(!summary.cancelled);
        assert!(!summary.persistence_degraded);
        assert_eq!(
            store.current().unwrap().canonical_text,
            "Example Domain\nVersion one."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_content_has_diff_and_updates_store() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &test_config(2),
            ScriptedFetcher::new(vec![Ok(PAGE_V1), Ok(PAGE_V2)]),
            store.clone(),
            &recorder,
        )
        .await;

        let summary = monitor.run(CancellationToken::new()).await;

        assert_eq!(
            summary.statuses,
            vec![ObservationStatus::FirstObservation, ObservationStatus::Changed]
        );
        let results = recorder.results();
        let diff = results[1].diff_summary.as_ref().unwrap();
        assert!(diff.has_changes());
        assert_eq!(diff.describe(), "+1 -1 lines");
        assert!(results[0].diff_summary.is_none());
        assert_eq!(
            store.current().unwrap().canonical_text,
            "Example Domain\nVersion two."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_markup_whitespace_noise_is_unchanged() {
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &test_config(2),
            ScriptedFetcher::new(vec![Ok(PAGE_V1), Ok(PAGE_V1_REFLOWED)]),
            Arc::new(MemoryStore::new()),
            &recorder,
        )
        .await;

        let summary = monitor.run(CancellationToken::new()).await;
        assert_eq!(summary.count(ObservationStatus::Unchanged), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_keeps_snapshot_and_continues() {
        let store = Arc::new(FlakyStore {
            failures: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            inner: MemoryStore::new(),
        });
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &test_config(3),
            ScriptedFetcher::new(vec![Ok(PAGE_V1), Err(FetchError::Timeout), Ok(PAGE_V1)]),
            store.clone(),
            &recorder,
        )
        .await;

        let summary = monitor.run(CancellationToken::new()).await;

        assert_eq!(
            summary.statuses,
            vec![
                ObservationStatus::FirstObservation,
                ObservationStatus::FetchFailed,
                ObservationStatus::Unchanged
            ]
        );
        let results = recorder.results();
        assert_eq!(results[1].error.as_deref(), Some("request timed out"));
        // Only the first observation wrote to the store.
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.inner.current().unwrap().canonical_text,
            "Example Domain\nVersion one."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page_is_extract_failure_not_change() {
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &test_config(3),
            ScriptedFetcher::new(vec![
                Ok(PAGE_V1),
                Ok("<html><body>   </body></html>"),
                Ok(PAGE_V1),
            ]),
            Arc::new(MemoryStore::new()),
            &recorder,
        )
        .await;

        let summary = monitor.run(CancellationToken::new()).await;
        assert_eq!(
            summary.statuses,
            vec![
                ObservationStatus::FirstObservation,
                ObservationStatus::ExtractFailed,
                ObservationStatus::Unchanged
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumes_from_persisted_snapshot() {
        let config = test_config(1);
        let store = Arc::new(MemoryStore::with_snapshot(Snapshot::new(
            "Example Domain\nVersion one.",
            Utc::now(),
        )));
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &config,
            ScriptedFetcher::new(vec![Ok(PAGE_V1)]),
            store,
            &recorder,
        )
        .await;
        assert!(monitor.snapshot().is_some());

        let summary = monitor.run(CancellationToken::new()).await;
        assert_eq!(summary.statuses, vec![ObservationStatus::Unchanged]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_is_flagged_and_retried() {
        let store = Arc::new(FlakyStore {
            failures: AtomicUsize::new(1),
            saves: AtomicUsize::new(0),
            inner: MemoryStore::new(),
        });
        let recorder = Recorder::default();
        let mut monitor = monitor_with(
            &test_config(2),
            ScriptedFetcher::new(vec![Ok(PAGE_V1)]),
            store.clone(),
            &recorder,
        )
        .await;
        let cancel = CancellationToken::new();

        let first = monitor.run_cycle(1, &cancel).await.unwrap();
        assert_eq!(first.status, ObservationStatus::FirstObservation);
        assert_eq!(first.persist_error.as_deref(), Some("Store error: disk full"));
        assert!(monitor.persistence_degraded());
        assert!(store.inner.current().is_none());

        let second = monitor.run_cycle(2, &cancel).await.unwrap();
        assert_eq!(second.status, ObservationStatus::Unchanged);
        assert!(second.persist_error.is_none());
        assert!(!monitor.persistence_degraded());
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
        assert!(store.inner.current().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_cycles_stops_cleanly() {
        let mut config = test_config(1);
        config.monitor.test_mode = false;
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &config,
            ScriptedFetcher::new(vec![Ok(PAGE_V1)]),
            Arc::new(MemoryStore::new()),
            &recorder,
        )
        .await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(cancel.clone()));

        // Cycles start at t=0, 10 and 20; cancel while sleeping towards 30.
        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();

        let summary = handle.await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.cycles(), 3);
        assert_eq!(recorder.results().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_fetch_abandons_cycle() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Recorder::default();
        let monitor = monitor_with(
            &test_config(2),
            Arc::new(HangingFetcher),
            store.clone(),
            &recorder,
        )
        .await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let summary = handle.await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.cycles(), 0);
        assert!(recorder.results().is_empty());
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_unusable_config_is_rejected() {
        let recorder = Recorder::default();
        let fetcher = ScriptedFetcher::new(vec![Ok(PAGE_V1)]);

        let mut zero_interval = test_config(2);
        zero_interval.monitor.interval_secs = 0;
        let mut no_url = test_config(2);
        no_url.monitor.url = None;

        for config in [zero_interval, no_url] {
            let notifier = Notifier::new().with_sink(recorder.clone());
            let result = Monitor::new(
                &config,
                fetcher.clone(),
                Arc::new(MemoryStore::new()),
                notifier,
            )
            .await;
            match result {
                Err(e) => assert!(e.is_configuration(), "unexpected error: {e}"),
                Ok(_) => panic!("monitor accepted an unusable config"),
            }
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            statuses: vec![
                ObservationStatus::FirstObservation,
                ObservationStatus::FetchFailed,
                ObservationStatus::Unchanged,
                ObservationStatus::Unchanged,
            ],
            ..RunSummary::default()
        };
        assert_eq!(summary.cycles(), 4);
        assert_eq!(
            summary.counts(),
            vec![("first_observation", 1), ("unchanged", 2), ("fetch_failed", 1)]
        );
    }
}
