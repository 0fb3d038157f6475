use crate::source::TelemetrySource;
use crate::workflow::session::TrackingSession;
use crate::workflow::snapshot::SnapshotStore;
use crate::workflow::store::ConfigStore;
use chrono::Utc;
use habcore::diagnostics::MetricsRecorder;
use habcore::processing::Detection;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub appended: bool,
    pub burst_confirmed: bool,
    pub chasers: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Another cycle still held the guard.
    Skipped,
    Completed(CycleReport),
}

/// Scheduled driver: fetch, validate, append, persist.
pub struct IngestionRunner {
    session: Arc<TrackingSession>,
    source: Arc<dyn TelemetrySource>,
    config: Arc<ConfigStore>,
    snapshots: Option<SnapshotStore>,
    metrics: Arc<MetricsRecorder>,
    guard: Mutex<()>,
}

impl IngestionRunner {
    pub fn new(
        session: Arc<TrackingSession>,
        source: Arc<dyn TelemetrySource>,
        config: Arc<ConfigStore>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            session,
            source,
            config,
            snapshots: None,
            metrics,
            guard: Mutex::new(()),
        }
    }

    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Runs one ingestion cycle unless one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_cycle) = self.guard.try_lock() else {
            warn!("previous ingestion cycle still running, skipping");
            self.metrics.record_skipped();
            return CycleOutcome::Skipped;
        };

        let config = self.config.get();
        let flight = self.session.flight();
        flight.set_detector_config(config.detector);
        flight.set_history_limit(config.max_history_length);

        let mut report = CycleReport::default();

        if config.balloon_callsign.is_empty() {
            debug!("no balloon callsign configured");
        } else {
            match self.source.fetch_station(&config.balloon_callsign).await {
                Ok(Some(station)) => match flight.append(station.sample) {
                    Ok(detection) => {
                        report.appended = true;
                        self.metrics.record_sample();
                        if let Detection::Confirmed { via, event } = detection {
                            info!(
                                "burst confirmed via {:?} at {:.6}, {:.6} ({:.0} m, peak {:.0} m)",
                                via, event.latitude, event.longitude, event.altitude, event.peak_altitude
                            );
                            report.burst_confirmed = true;
                        }
                    }
                    Err(err) => {
                        warn!("rejected sample for {}: {}", config.balloon_callsign, err);
                        report.errors += 1;
                        self.metrics.record_error();
                    }
                },
                Ok(None) => debug!("no new position for {}", config.balloon_callsign),
                Err(err) => {
                    warn!("fetching {} failed: {:#}", config.balloon_callsign, err);
                    report.errors += 1;
                    self.metrics.record_error();
                }
            }
        }

        let mut chasers = Vec::with_capacity(config.chaser_callsigns.len());
        for callsign in &config.chaser_callsigns {
            match self.source.fetch_station(callsign).await {
                Ok(Some(station)) => chasers.push(station),
                Ok(None) => debug!("no position for chaser {}", callsign),
                Err(err) => {
                    warn!("fetching chaser {} failed: {:#}", callsign, err);
                    report.errors += 1;
                    self.metrics.record_error();
                }
            }
        }
        report.chasers = chasers.len();
        self.session.update_chasers(chasers);
        self.session.touch(Utc::now());

        if let Some(store) = &self.snapshots {
            if let Err(err) = store.save(&self.session.persisted()) {
                warn!("persisting snapshot failed: {:#}", err);
                report.errors += 1;
                self.metrics.record_error();
            }
        }

        self.metrics.record_cycle();
        debug!("cycle complete: {:?}", report);
        CycleOutcome::Completed(report)
    }

    /// Polls until the task is dropped, awaiting each cycle inline.
    ///
    /// Ticks that elapse while a cycle runs are counted as skipped. A new
    /// interval from the config store takes effect after the current cycle.
    pub async fn run(self: Arc<Self>) {
        let mut secs = self.config.get().update_interval_secs.max(1);
        info!("ingestion loop started (every {secs}s)");
        let mut ticker = schedule(secs, Instant::now());
        loop {
            ticker.tick().await;
            let started = Instant::now();
            self.run_cycle().await;

            let missed = started.elapsed().as_secs() / secs;
            if missed > 0 {
                warn!("ingestion cycle overran {missed} tick(s), skipping them");
                for _ in 0..missed {
                    self.metrics.record_skipped();
                }
            }

            let configured = self.config.get().update_interval_secs.max(1);
            if configured != secs {
                info!("ingestion interval changed from {secs}s to {configured}s");
                secs = configured;
                ticker = schedule(secs, Instant::now() + Duration::from_secs(secs));
            }
        }
    }
}

fn schedule(secs: u64, start: Instant) -> Interval {
    let mut ticker = interval_at(start, Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::TrackerConfig;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use habcore::interface::{PositionSample, StationReport};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Balloon altitudes served in order, optionally held until `gate` fires; chasers always answer.
    struct ScriptedSource {
        altitudes: StdMutex<VecDeque<f64>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedSource {
        fn new(altitudes: &[f64]) -> Self {
            Self {
                altitudes: StdMutex::new(altitudes.iter().copied().collect()),
                gate: None,
            }
        }
    }

    #[async_trait]
    impl TelemetrySource for ScriptedSource {
        async fn fetch_station(&self, callsign: &str) -> anyhow::Result<Option<StationReport>> {
            match callsign {
                "N4BWR-11" => {
                    if let Some(gate) = &self.gate {
                        gate.notified().await;
                    }
                    let mut altitudes = self.altitudes.lock().unwrap();
                    let step = altitudes.len() as i64;
                    Ok(altitudes.pop_front().map(|alt| {
                        StationReport::new(
                            callsign,
                            PositionSample::new(33.6, -85.2, at(-step)).with_altitude(alt),
                        )
                    }))
                }
                "BROKEN" => anyhow::bail!("station lookup failed"),
                _ => Ok(Some(StationReport::new(
                    callsign,
                    PositionSample::new(33.5, -85.3, at(0)),
                ))),
            }
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig {
            balloon_callsign: "N4BWR-11".into(),
            chaser_callsigns: vec!["KD4ABC-9".into(), "BROKEN".into()],
            ..TrackerConfig::default()
        }
    }

    fn runner(source: ScriptedSource) -> (IngestionRunner, Arc<TrackingSession>, Arc<MetricsRecorder>) {
        let session = Arc::new(TrackingSession::default());
        let metrics = Arc::new(MetricsRecorder::new());
        let runner = IngestionRunner::new(
            session.clone(),
            Arc::new(source),
            Arc::new(ConfigStore::new(config(), None)),
            metrics.clone(),
        );
        (runner, session, metrics)
    }

    #[tokio::test]
    async fn cycle_appends_balloon_and_refreshes_chasers() {
        let (runner, session, metrics) = runner(ScriptedSource::new(&[4200.0]));

        let outcome = runner.run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Completed(CycleReport {
                appended: true,
                burst_confirmed: false,
                chasers: 1,
                errors: 1,
            })
        );

        let model = session.model();
        assert_eq!(model.balloon.history.len(), 1);
        assert_eq!(model.chasers[0].report.callsign, "KD4ABC-9");
        assert!(model.chasers[0].distance_to_balloon_km.is_some());
        assert!(model.last_update.is_some());

        let counters = metrics.snapshot();
        assert_eq!((counters.cycles, counters.samples, counters.errors), (1, 1, 1));
    }

    #[tokio::test]
    async fn burst_is_reported_on_the_confirming_cycle() {
        let (runner, session, _) =
            runner(ScriptedSource::new(&[3200.0, 9000.0, 7900.0, 7700.0, 7500.0]));
        let mut confirmed = Vec::new();
        for _ in 0..5 {
            if let CycleOutcome::Completed(report) = runner.run_cycle().await {
                confirmed.push(report.burst_confirmed);
            }
        }
        assert_eq!(confirmed, vec![false, false, false, false, true]);
        assert!(session.model().balloon.burst_detected);
    }

    #[tokio::test]
    async fn exhausted_source_is_not_an_error() {
        let (runner, session, metrics) = runner(ScriptedSource::new(&[]));
        let CycleOutcome::Completed(report) = runner.run_cycle().await else {
            panic!("cycle skipped");
        };
        assert!(!report.appended);
        assert!(session.model().balloon.history.is_empty());
        assert_eq!(metrics.snapshot().samples, 0);
    }

    #[tokio::test]
    async fn cycle_persists_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");
        let (runner, _, _) = runner(ScriptedSource::new(&[5000.0]));
        let runner = runner.with_snapshots(SnapshotStore::new(&path));

        runner.run_cycle().await;
        let saved = SnapshotStore::new(&path).load().unwrap().unwrap();
        assert_eq!(saved.flight.history().len(), 1);
        assert_eq!(saved.chasers.len(), 1);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_skipped() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedSource {
            gate: Some(gate.clone()),
            ..ScriptedSource::new(&[4000.0])
        };
        let (runner, session, metrics) = runner(source);
        let runner = Arc::new(runner);

        let first = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run_cycle().await }
        });
        // Let the first cycle take the guard and park on the gate.
        while runner.guard.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }

        assert_eq!(runner.run_cycle().await, CycleOutcome::Skipped);
        assert_eq!(metrics.snapshot().skipped_cycles, 1);

        gate.notify_one();
        assert!(matches!(first.await.unwrap(), CycleOutcome::Completed(_)));
        assert_eq!(session.model().balloon.history.len(), 1);
    }

    #[tokio::test]
    async fn aborting_the_loop_cancels_the_cycle_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");
        let gate = Arc::new(Notify::new());
        let source = ScriptedSource {
            gate: Some(gate.clone()),
            ..ScriptedSource::new(&[4000.0])
        };
        let (runner, session, metrics) = runner(source);
        let runner = Arc::new(runner.with_snapshots(SnapshotStore::new(&path)));

        let task = tokio::spawn(runner.clone().run());
        while runner.guard.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(runner.guard.try_lock().is_ok());

        // Nothing is left parked on the gate to finish the cycle later.
        gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!path.exists());
        assert!(session.model().balloon.history.is_empty());
        assert_eq!(metrics.snapshot().cycles, 0);
    }
}
