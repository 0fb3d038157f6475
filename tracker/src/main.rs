use anyhow::Context;
use api::AppState;
use clap::Parser;
use generator::template::prediction_kml;
use generator::{FlightProfileConfig, GeneratedFlight, ReplaySource};
use habcore::diagnostics::MetricsRecorder;
use habcore::interface::{PositionSample, Prediction, StationReport};
use habcore::math::geodesy::distance_km;
use habcore::math::km_to_miles;
use habcore::FlightState;
use log::{info, warn};
use prediction::{load_prediction, parse_prediction};
use source::{AprsClient, TelemetrySource};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::oneshot;
use workflow::{ConfigStore, IngestionRunner, SnapshotStore, TrackerConfig, TrackingSession};

mod api;
mod generator;
mod prediction;
mod source;
mod workflow;

/// Predicted burst offset used when a generated flight supplies its own prediction.
const SIMULATED_BURST_OFFSET_KM: f64 = 5.0;

#[derive(Parser)]
#[command(author, version, about = "High-altitude balloon tracker with burst detection and landing correction")]
struct Args {
    /// Tracker config (YAML); written with defaults if it does not exist
    #[arg(long, default_value = "tracker.yaml")]
    config: PathBuf,
    /// Directory for the tracking snapshot and replay logs
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Balloon callsign to track
    #[arg(long)]
    balloon: Option<String>,
    /// Chase vehicle callsign (repeatable)
    #[arg(long = "chaser")]
    chasers: Vec<String>,
    #[arg(long)]
    interval_secs: Option<u64>,
    /// Load a KML flight prediction
    #[arg(long)]
    prediction: Option<PathBuf>,
    /// Replay a generated flight through the core and report the result
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Use a generated flight as the telemetry source instead of aprs.fi
    #[arg(long, default_value_t = false)]
    simulate: bool,
    /// Run the ingestion loop and HTTP API until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Seed for generated flights
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = TrackerConfig::load_or_init(&args.config)?;
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(balloon) = &args.balloon {
        config.balloon_callsign = balloon.clone();
    }
    config.chaser_callsigns.extend(args.chasers.iter().cloned());
    if let Some(secs) = args.interval_secs {
        config.update_interval_secs = secs;
    }
    let mut config = config.normalized();

    if args.offline {
        return run_offline(&args, &config);
    }

    let session = Arc::new(TrackingSession::new(FlightState::new(
        config.detector,
        config.max_history_length,
    )));
    let snapshots = SnapshotStore::new(config.snapshot_path());
    match snapshots.load() {
        Ok(Some(persisted)) => {
            session.restore(persisted);
            session.flight().set_detector_config(config.detector);
            session.flight().set_history_limit(config.max_history_length);
            info!("restored tracking snapshot from {}", snapshots.path().display());
        }
        Ok(None) => {}
        Err(err) => warn!("starting fresh, snapshot unusable: {err:#}"),
    }

    if let Some(path) = &args.prediction {
        let prediction = load_prediction(path)?;
        session
            .flight()
            .set_prediction(prediction)
            .with_context(|| format!("applying prediction {}", path.display()))?;
        info!("prediction loaded from {}", path.display());
    }

    if !args.serve {
        snapshots.save(&session.persisted())?;
        let view = session.flight().snapshot();
        println!(
            "Tracking {} -> samples {}, burst detected {}, prediction {}",
            if config.balloon_callsign.is_empty() {
                "(no balloon)"
            } else {
                config.balloon_callsign.as_str()
            },
            view.history.len(),
            view.burst_detected,
            view.prediction.is_some()
        );
        return Ok(());
    }

    let source: Arc<dyn TelemetrySource> = if args.simulate {
        let flight = generated_flight(&args, &config)?;
        if config.balloon_callsign.is_empty() {
            config.balloon_callsign = flight.callsign.clone();
        }
        let has_prediction = session.flight().inspect(|state| state.prediction().is_some());
        if !has_prediction {
            let prediction = parse_prediction(&prediction_kml(&flight, SIMULATED_BURST_OFFSET_KM))?;
            session.flight().set_prediction(prediction)?;
        }
        info!(
            "simulating {} with {} samples",
            config.balloon_callsign,
            flight.samples.len()
        );
        Arc::new(simulated_source(&flight, &config))
    } else {
        Arc::new(AprsClient::new(&config.aprs)?)
    };

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("parsing bind address {}", config.bind_address))?;
    let metrics = Arc::new(MetricsRecorder::new());
    let store = Arc::new(ConfigStore::new(config, Some(args.config.clone())));
    let runner = Arc::new(
        IngestionRunner::new(session.clone(), source, store.clone(), metrics.clone())
            .with_snapshots(snapshots),
    );
    let state = AppState::new(session, store, metrics);

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    runtime.block_on(async move {
        let (stop, stopped) = oneshot::channel::<()>();
        let mut server = tokio::spawn(api::serve(state, addr, async move {
            let _ = stopped.await;
        }));
        let ingestion = tokio::spawn(runner.run());

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("awaiting Ctrl+C to exit")?;
                info!("Ctrl+C received, shutting down");
            }
            joined = &mut server => {
                ingestion.abort();
                return joined.context("HTTP server task failed")?;
            }
        }

        ingestion.abort();
        let _ = stop.send(());
        server.await.context("joining HTTP server")??;
        Ok::<(), anyhow::Error>(())
    })
}

fn generated_flight(args: &Args, config: &TrackerConfig) -> anyhow::Result<GeneratedFlight> {
    let mut profile = FlightProfileConfig {
        seed: args.seed,
        ..FlightProfileConfig::default()
    };
    if !config.balloon_callsign.is_empty() {
        profile.callsign = config.balloon_callsign.clone();
    }
    profile.generate().context("generating flight")
}

fn simulated_source(flight: &GeneratedFlight, config: &TrackerConfig) -> ReplaySource {
    let launch = &flight.samples[0];
    config
        .chaser_callsigns
        .iter()
        .fold(ReplaySource::new(flight), |source, callsign| {
            source.with_chaser(StationReport::new(
                callsign.clone(),
                PositionSample::new(launch.latitude, launch.longitude, launch.timestamp),
            ))
        })
}

/// Replays a generated flight through a fresh flight state and logs how close the correction landed.
fn run_offline(args: &Args, config: &TrackerConfig) -> anyhow::Result<()> {
    let flight = generated_flight(args, config)?;
    let prediction: Prediction = match &args.prediction {
        Some(path) => load_prediction(path)?,
        None => parse_prediction(&prediction_kml(&flight, SIMULATED_BURST_OFFSET_KM))?,
    };

    let mut state = FlightState::new(config.detector, config.max_history_length);
    state.set_prediction(prediction)?;
    let mut confirmed_at = None;
    for (index, sample) in flight.samples.iter().enumerate() {
        if state.append(sample.clone())?.is_confirmed() {
            confirmed_at = Some(index);
        }
    }

    let miss_km = state.corrected_landing().map(|landing| {
        distance_km(
            landing.latitude,
            landing.longitude,
            flight.landing_point.latitude,
            flight.landing_point.longitude,
        )
    });
    println!(
        "Offline replay -> samples {}, burst at {}, confirmed at {:?}, landing miss {}",
        flight.samples.len(),
        flight.burst_index,
        confirmed_at,
        miss_km.map_or_else(
            || "n/a".to_string(),
            |km| format!("{km:.3} km ({:.3} mi)", km_to_miles(km))
        )
    );

    let event = state.burst_event();
    let report = format!(
        "seed={} samples={} burst_index={} confirmed_at={:?} via={:?} peak_m={:?} miss_km={:?}\n",
        args.seed,
        flight.samples.len(),
        flight.burst_index,
        confirmed_at,
        event.map(|e| e.via),
        event.map(|e| e.peak_altitude),
        miss_km
    );
    let report_path = config.data_dir.join("offline_replay.log");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&report_path)
        .with_context(|| format!("opening {}", report_path.display()))?;
    file.write_all(report.as_bytes())?;
    Ok(())
}
