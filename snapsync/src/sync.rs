//! Sync cycles: scan the source table, normalize, compare with the published snapshot and
//! publish or record the outcome.
//!
//! A cycle moves through [`CycleState`]s:
//!
//! ```text
//! Idle -> Scanning -> Normalizing -> Comparing -> (Writing | Skipping) -> Idle
//! ```
//!
//! and ends in [`CycleState::Error`] when scanning, comparing or writing fails. Every cycle
//! records its outcome in the store, including failed ones, and a failed cycle never
//! replaces the published snapshot.

use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use futures::StreamExt;
use metrics::{counter, gauge, histogram};
use snapsync_config::shared::SyncConfig;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::compare::{SnapshotDifference, first_difference};
use crate::concurrency::shutdown::{ShutdownRx, wait_for_shutdown};
use crate::conversions::normalize::FieldNormalizer;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::metrics::{
    OUTCOME_LABEL, SNAPSYNC_CYCLE_DURATION_SECONDS, SNAPSYNC_CYCLES_TOTAL,
    SNAPSYNC_SNAPSHOT_RECORDS, TABLE_NAME_LABEL,
};
use crate::scan::TableScanner;
use crate::schema::TableSchema;
use crate::source::SourceTable;
use crate::store::SnapshotStore;
use crate::summary::DatasetSummary;
use crate::types::{CanonicalRecord, Snapshot, SyncOutcome, SyncStatus, VersionTag};
use crate::{bail, sync_error};

/// Source of the current local time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// [`Clock`] reading the system time in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Phase of a sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Scanning,
    Normalizing,
    Comparing,
    Writing,
    Skipping,
    Error,
}

/// What a cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: SyncOutcome,
    pub started_at: NaiveDateTime,
    pub duration: Duration,
    /// Records in the published snapshot after the cycle.
    pub record_count: usize,
    /// Version of the published snapshot after the cycle.
    pub version: Option<VersionTag>,
    /// First difference with the previous snapshot, when one was published before.
    pub difference: Option<SnapshotDifference>,
    /// Statistics of the newly published snapshot.
    pub summary: Option<DatasetSummary>,
    pub error: Option<SyncError>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.outcome != SyncOutcome::Error
    }

    /// Returns the error of a failed cycle.
    pub fn into_result(self) -> SyncResult<CycleReport> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Result of the successful part of a cycle.
struct Completed {
    outcome: SyncOutcome,
    record_count: usize,
    version: VersionTag,
    difference: Option<SnapshotDifference>,
    summary: Option<DatasetSummary>,
}

/// Runs sync cycles from a [`SourceTable`] into a [`SnapshotStore`].
#[derive(Debug)]
pub struct SyncOrchestrator<S, T, C = SystemClock> {
    source: S,
    store: T,
    clock: C,
    normalizer: FieldNormalizer,
    allow_empty_snapshot: bool,
    state: watch::Sender<CycleState>,
}

impl<S, T> SyncOrchestrator<S, T, SystemClock>
where
    S: SourceTable + Sync,
    T: SnapshotStore + Sync,
{
    pub fn new(source: S, store: T, schema: Arc<TableSchema>, config: &SyncConfig) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);

        Self {
            source,
            store,
            clock: SystemClock,
            normalizer: FieldNormalizer::new(schema),
            allow_empty_snapshot: config.allow_empty_snapshot,
            state,
        }
    }
}

impl<S, T, C> SyncOrchestrator<S, T, C>
where
    S: SourceTable + Sync,
    T: SnapshotStore + Sync,
    C: Clock + Sync,
{
    /// Replaces the clock used to timestamp cycles.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> SyncOrchestrator<S, T, C2> {
        SyncOrchestrator {
            source: self.source,
            store: self.store,
            clock,
            normalizer: self.normalizer,
            allow_empty_snapshot: self.allow_empty_snapshot,
            state: self.state,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Subscribes to the state of the cycle in progress.
    pub fn subscribe_state(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    fn transition(&self, state: CycleState) {
        debug!(table = self.source.name(), ?state, "cycle state changed");
        self.state.send_replace(state);
    }

    /// Runs one cycle.
    ///
    /// Failures are reported in the returned [`CycleReport`] and recorded in the store.
    pub async fn run_cycle(&self) -> CycleReport {
        let table_name = self.source.name().to_string();
        let started = Instant::now();
        let started_at = self.clock.now();

        info!(table = %table_name, "starting sync cycle");

        let report = match self.try_cycle(started_at).await {
            Ok(completed) => {
                self.transition(CycleState::Idle);
                CycleReport {
                    outcome: completed.outcome,
                    started_at,
                    duration: started.elapsed(),
                    record_count: completed.record_count,
                    version: Some(completed.version),
                    difference: completed.difference,
                    summary: completed.summary,
                    error: None,
                }
            }
            Err(err) => {
                self.transition(CycleState::Error);
                let (err, record_count) = self.record_failure(started_at, err).await;
                self.transition(CycleState::Idle);
                CycleReport {
                    outcome: SyncOutcome::Error,
                    started_at,
                    duration: started.elapsed(),
                    record_count,
                    version: None,
                    difference: None,
                    summary: None,
                    error: Some(err),
                }
            }
        };

        counter!(
            SNAPSYNC_CYCLES_TOTAL,
            TABLE_NAME_LABEL => table_name.clone(),
            OUTCOME_LABEL => report.outcome.as_str()
        )
        .increment(1);
        histogram!(SNAPSYNC_CYCLE_DURATION_SECONDS, TABLE_NAME_LABEL => table_name.clone())
            .record(report.duration.as_secs_f64());

        match &report.error {
            None => info!(
                table = %table_name,
                outcome = %report.outcome,
                records = report.record_count,
                version = ?report.version.as_ref().map(VersionTag::as_str),
                duration_ms = report.duration.as_millis() as u64,
                "sync cycle finished"
            ),
            Some(err) => error!(
                table = %table_name,
                error = %err.summary(),
                duration_ms = report.duration.as_millis() as u64,
                "sync cycle failed"
            ),
        }

        report
    }

    async fn try_cycle(&self, timestamp: NaiveDateTime) -> SyncResult<Completed> {
        let canonical = self.scan_canonical().await?;

        gauge!(SNAPSYNC_SNAPSHOT_RECORDS, TABLE_NAME_LABEL => self.source.name().to_string())
            .set(canonical.len() as f64);

        if canonical.is_empty() && !self.allow_empty_snapshot {
            bail!(
                ErrorKind::EmptySource,
                "Source table returned no records",
                format!(
                    "table `{}` is empty, keeping the published snapshot",
                    self.source.name()
                )
            );
        }

        let snapshot = Snapshot::new(self.normalizer.schema().clone(), canonical, timestamp);

        self.transition(CycleState::Comparing);
        let stored = self.read_stored().await?;

        let difference = match &stored {
            Some(stored) => match first_difference(stored, &snapshot) {
                Some(difference) => Some(difference),
                None => {
                    self.transition(CycleState::Skipping);
                    self.store
                        .write_status(&SyncStatus::unchanged(timestamp, stored))
                        .await?;

                    return Ok(Completed {
                        outcome: SyncOutcome::NoChange,
                        record_count: stored.record_count(),
                        version: stored.version().clone(),
                        difference: None,
                        summary: None,
                    });
                }
            },
            None => None,
        };

        if let Some(difference) = &difference {
            info!(table = self.source.name(), %difference, "changes detected");
        }

        self.transition(CycleState::Writing);
        self.store.write(&snapshot).await?;

        let summary = DatasetSummary::from_snapshot(&snapshot);
        summary.log();

        Ok(Completed {
            outcome: SyncOutcome::Ok,
            record_count: snapshot.record_count(),
            version: snapshot.version().clone(),
            difference,
            summary: Some(summary),
        })
    }

    /// Scans the source and normalizes each page before the next one is read, so raw
    /// records never outlive their page.
    async fn scan_canonical(&self) -> SyncResult<Vec<CanonicalRecord>> {
        let scanner = TableScanner::new(&self.source);
        let mut pages = pin!(scanner.pages());

        let mut canonical = Vec::new();
        loop {
            self.transition(CycleState::Scanning);
            let Some(page) = pages.next().await else {
                break;
            };
            let page = page?;

            self.transition(CycleState::Normalizing);
            canonical.extend(
                page.records
                    .iter()
                    .map(|record| self.normalizer.normalize(record)),
            );
        }

        Ok(canonical)
    }

    /// Reads the published snapshot. A missing or unreadable one compares as changed.
    async fn read_stored(&self) -> SyncResult<Option<Snapshot>> {
        match self.store.read_last().await {
            Ok(stored) => Ok(Some(stored)),
            Err(err) if err.kind() == ErrorKind::SnapshotNotFound => {
                info!(table = self.source.name(), "no published snapshot, comparison skipped");
                Ok(None)
            }
            Err(err) if err.kind() == ErrorKind::SnapshotCorrupted => {
                warn!(
                    table = self.source.name(),
                    error = %err.summary(),
                    "published snapshot is unreadable and will be replaced"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Records an `ERROR` status for `err`, returning the error to report and the number of
    /// records in the snapshot that stays published.
    async fn record_failure(&self, timestamp: NaiveDateTime, err: SyncError) -> (SyncError, usize) {
        let stored = self.store.read_last().await.ok();

        let status = SyncStatus::failed(timestamp, &err, stored.as_ref());
        let record_count = status.record_count;
        match self.store.write_status(&status).await {
            Ok(()) => (err, record_count),
            Err(status_err) => {
                error!(
                    table = self.source.name(),
                    error = %status_err.summary(),
                    "failed to record error status"
                );
                (SyncError::from(vec![err, status_err]), record_count)
            }
        }
    }

    /// Runs a cycle every `interval` until shutdown is requested.
    ///
    /// The first cycle starts immediately. A failed cycle does not stop the loop, and a
    /// cycle in progress completes before the loop exits. Returns the number of cycles run.
    pub async fn run_on_interval(&self, interval: Duration, mut shutdown: ShutdownRx) -> usize {
        info!(
            table = self.source.name(),
            interval_secs = interval.as_secs(),
            "starting scheduled sync"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => {
                    info!(table = self.source.name(), cycles, "shutdown requested, stopping scheduled sync");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    cycles += 1;

                    if !report.is_success() {
                        warn!(
                            table = self.source.name(),
                            next_in_secs = interval.as_secs(),
                            "cycle failed, retrying on next interval"
                        );
                    }
                }
            }
        }

        cycles
    }
}

/// Converts a configured interval in minutes into a [`Duration`].
pub fn interval_from_minutes(minutes: u64) -> SyncResult<Duration> {
    if minutes == 0 {
        return Err(sync_error!(
            ErrorKind::ConfigError,
            "Sync interval must be at least one minute"
        ));
    }

    let Some(secs) = minutes.checked_mul(60) else {
        bail!(
            ErrorKind::ConfigError,
            "Sync interval is too long",
            format!("{minutes} minutes cannot be represented in seconds")
        );
    };

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySourceTable;
    use crate::store::memory::MemorySnapshotStore;
    use crate::test_utils::clock::FixedClock;
    use crate::test_utils::records::{offers, test_timestamp};
    use crate::test_utils::source::FaultySourceTable;

    async fn orchestrator(
        count: usize,
        config: &SyncConfig,
    ) -> SyncOrchestrator<FaultySourceTable, MemorySnapshotStore, FixedClock> {
        let table = MemorySourceTable::new("ofertas_trabajo", vec!["ID_Oferta".to_string()]);
        table.insert(offers(count)).await.unwrap();

        SyncOrchestrator::new(
            FaultySourceTable::new(table),
            MemorySnapshotStore::new(),
            Arc::new(TableSchema::job_offers()),
            config,
        )
        .with_clock(FixedClock::new(test_timestamp()))
    }

    #[tokio::test]
    async fn empty_source_keeps_published_snapshot() {
        let orchestrator = orchestrator(0, &SyncConfig::default()).await;

        let report = orchestrator.run_cycle().await;

        assert_eq!(report.outcome, SyncOutcome::Error);
        assert_eq!(report.error.unwrap().kind(), ErrorKind::EmptySource);
        assert_eq!(orchestrator.store().body_writes().await, 0);
    }

    #[tokio::test]
    async fn empty_source_publishes_when_allowed() {
        let config = SyncConfig {
            allow_empty_snapshot: true,
            ..SyncConfig::default()
        };
        let orchestrator = orchestrator(0, &config).await;

        let report = orchestrator.run_cycle().await;

        assert_eq!(report.outcome, SyncOutcome::Ok);
        assert_eq!(report.record_count, 0);
    }

    #[tokio::test]
    async fn changed_source_reports_first_difference() {
        let orchestrator = orchestrator(3, &SyncConfig::default()).await;
        orchestrator.run_cycle().await.into_result().unwrap();

        orchestrator
            .source()
            .inner()
            .insert(offers(4))
            .await
            .unwrap();
        let report = orchestrator.run_cycle().await;

        assert_eq!(report.outcome, SyncOutcome::Ok);
        assert_eq!(
            report.difference,
            Some(SnapshotDifference::RecordCount { old: 3, new: 4 })
        );
        assert_eq!(report.summary.unwrap().records, 4);
    }

    #[tokio::test]
    async fn cycle_ends_idle() {
        let orchestrator = orchestrator(2, &SyncConfig::default()).await;
        let state = orchestrator.subscribe_state();

        orchestrator.run_cycle().await;

        assert_eq!(*state.borrow(), CycleState::Idle);
    }

    #[tokio::test]
    async fn scan_failing_mid_table_writes_nothing() {
        let table = MemorySourceTable::new("ofertas_trabajo", vec!["ID_Oferta".to_string()]);
        table.insert(offers(250)).await.unwrap();
        let orchestrator = SyncOrchestrator::new(
            FaultySourceTable::new(table).fail_scan_page(1),
            MemorySnapshotStore::new(),
            Arc::new(TableSchema::job_offers()),
            &SyncConfig::default(),
        )
        .with_clock(FixedClock::new(test_timestamp()));

        let report = orchestrator.run_cycle().await;

        assert_eq!(report.outcome, SyncOutcome::Error);
        assert_eq!(report.error.unwrap().kind(), ErrorKind::ScanFailure);
        assert_eq!(orchestrator.source().scan_page_calls().await, 2);
        assert_eq!(orchestrator.store().body_writes().await, 0);
        let history = orchestrator.store().status_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, SyncOutcome::Error);
        assert_eq!(history[0].record_count, 0);

        let report = orchestrator.run_cycle().await;
        assert_eq!(report.outcome, SyncOutcome::Ok);
        assert_eq!(report.record_count, 250);
    }

    #[test]
    fn zero_minute_interval_is_rejected() {
        assert!(interval_from_minutes(0).is_err());
        assert_eq!(
            interval_from_minutes(30).unwrap(),
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn overflowing_interval_is_rejected() {
        let err = interval_from_minutes(u64::MAX).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
