use crate::api::model::{BurstSummary, HealthReport};
use crate::prediction::parse_prediction;
use crate::workflow::config::TrackerConfig;
use crate::workflow::session::TrackingSession;
use crate::workflow::store::ConfigStore;
use anyhow::Context;
use chrono::Utc;
use habcore::diagnostics::MetricsRecorder;
use habcore::interface::{PredictionMetrics, PredictionPoint};
use habcore::prelude::GeoPoint;
use habcore::processing::corrector::replay_from;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

const KML_BODY_LIMIT: u64 = 10 * 1024 * 1024;
const JSON_BODY_LIMIT: u64 = 64 * 1024;

/// Shared handles every route reads from.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<TrackingSession>,
    pub config: Arc<ConfigStore>,
    pub metrics: Arc<MetricsRecorder>,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        session: Arc<TrackingSession>,
        config: Arc<ConfigStore>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            session,
            config,
            metrics,
            started: Instant::now(),
        }
    }

    /// Pushes thresholds and the history cap into the live flight.
    fn apply(&self, config: &TrackerConfig) {
        let flight = self.session.flight();
        flight.set_detector_config(config.detector);
        flight.set_history_limit(config.max_history_length);
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KmlContentRequest {
    kml_content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsRequest {
    burst_point: Option<PredictionPoint>,
    landing_point: Option<PredictionPoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LandingRequest {
    actual_burst_lat: Option<f64>,
    actual_burst_lon: Option<f64>,
    prediction_metrics: Option<PredictionMetrics>,
}

#[derive(Deserialize)]
struct CallsignRequest {
    callsign: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntervalRequest {
    interval_secs: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectorPatch {
    min_altitude_to_start: Option<f64>,
    significant_drop: Option<f64>,
    required_descent_points: Option<u32>,
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: DeserializeOwned + Send>(
    limit: u64,
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::json())
}

fn ok<T: Serialize>(body: &T) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(body), StatusCode::OK)
}

fn error(status: StatusCode, message: impl std::fmt::Display) -> WithStatus<Json> {
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": message.to_string() })),
        status,
    )
}

fn bad_request(message: impl std::fmt::Display) -> WithStatus<Json> {
    error(StatusCode::BAD_REQUEST, message)
}

fn config_reply(state: &AppState, result: anyhow::Result<TrackerConfig>) -> WithStatus<Json> {
    match result {
        Ok(config) => {
            state.apply(&config);
            ok(&config)
        }
        Err(err) => bad_request(format!("{err:#}")),
    }
}

fn tracking_routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| {
            ok(&HealthReport {
                status: "OK",
                timestamp: Utc::now(),
                uptime_secs: state.started.elapsed().as_secs(),
                metrics: state.metrics.snapshot(),
            })
        });

    let tracking = warp::path!("api" / "tracking")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| ok(&state.session.model()));

    let reset = warp::path!("api" / "tracking" / "reset")
        .and(warp::post())
        .and(with_state(state.clone()))
        .map(|state: AppState| {
            state.session.reset();
            info!("tracking reset over HTTP");
            ok(&json!({ "message": "Tracking data reset" }))
        });

    let history = warp::path!("api" / "tracking" / "balloon" / "history")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| {
            ok(&state
                .session
                .flight()
                .inspect(|flight| flight.history().to_vec()))
        });

    let chasers = warp::path!("api" / "tracking" / "chasers")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| ok(&state.session.chasers()));

    let prediction = warp::path!("api" / "tracking" / "prediction")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| {
            ok(&state
                .session
                .flight()
                .inspect(|flight| flight.prediction().cloned()))
        });

    let burst = warp::path!("api" / "tracking" / "burst")
        .and(warp::get())
        .and(with_state(state))
        .map(|state: AppState| ok(&BurstSummary::from(&state.session.flight().snapshot())));

    health
        .or(tracking)
        .or(reset)
        .or(history)
        .or(chasers)
        .or(prediction)
        .or(burst)
}

fn kml_routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let current = warp::path!("api" / "kml")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| {
            ok(&state
                .session
                .flight()
                .inspect(|flight| flight.prediction().cloned()))
        });

    let upload = warp::path!("api" / "kml" / "content")
        .and(warp::post())
        .and(json_body::<KmlContentRequest>(KML_BODY_LIMIT))
        .and(with_state(state.clone()))
        .map(|request: KmlContentRequest, state: AppState| {
            let Some(content) = request.kml_content.filter(|c| !c.trim().is_empty()) else {
                return bad_request("KML content is required");
            };
            let loaded = parse_prediction(&content).and_then(|prediction| {
                state
                    .session
                    .flight()
                    .set_prediction(prediction)
                    .context("rejecting prediction")
            });
            match loaded {
                Ok(()) => {
                    let prediction = state
                        .session
                        .flight()
                        .inspect(|flight| flight.prediction().cloned());
                    info!("prediction loaded over HTTP");
                    ok(&json!({ "message": "KML content processed", "prediction": prediction }))
                }
                Err(err) => {
                    warn!("KML upload rejected: {err:#}");
                    bad_request(format!("{err:#}"))
                }
            }
        });

    let clear = warp::path!("api" / "kml")
        .and(warp::delete())
        .and(with_state(state))
        .map(|state: AppState| {
            state.session.flight().clear_prediction();
            ok(&json!({ "message": "Prediction cleared" }))
        });

    let metrics = warp::path!("api" / "kml" / "calculate-metrics")
        .and(warp::post())
        .and(json_body::<MetricsRequest>(JSON_BODY_LIMIT))
        .map(|request: MetricsRequest| match (request.burst_point, request.landing_point) {
            (Some(burst), Some(landing)) => ok(&PredictionMetrics::between(&burst, &landing)),
            _ => bad_request("Both burstPoint and landingPoint are required"),
        });

    let landing = warp::path!("api" / "kml" / "calculate-landing")
        .and(warp::post())
        .and(json_body::<LandingRequest>(JSON_BODY_LIMIT))
        .map(|request: LandingRequest| {
            match (
                request.actual_burst_lat,
                request.actual_burst_lon,
                request.prediction_metrics,
            ) {
                (Some(latitude), Some(longitude), Some(metrics)) => {
                    let origin = GeoPoint::new(latitude, longitude);
                    if !origin.is_valid() {
                        return bad_request("Burst coordinates out of range");
                    }
                    ok(&replay_from(origin, metrics))
                }
                _ => bad_request(
                    "actualBurstLat, actualBurstLon and predictionMetrics are required",
                ),
            }
        });

    current.or(upload).or(clear).or(metrics).or(landing)
}

fn config_routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let get = warp::path!("api" / "config")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: AppState| ok(&state.config.get()));

    let merge = warp::path!("api" / "config")
        .and(warp::put())
        .and(json_body::<Value>(JSON_BODY_LIMIT))
        .and(with_state(state.clone()))
        .map(|patch: Value, state: AppState| {
            let result = state.config.merge(patch);
            config_reply(&state, result)
        });

    let balloon = warp::path!("api" / "config" / "balloon-callsign")
        .and(warp::put())
        .and(json_body::<CallsignRequest>(JSON_BODY_LIMIT))
        .and(with_state(state.clone()))
        .map(|request: CallsignRequest, state: AppState| match request.callsign {
            Some(callsign) => {
                let result = state.config.set_balloon_callsign(&callsign);
                config_reply(&state, result)
            }
            None => bad_request("Callsign is required"),
        });

    let add_chaser = warp::path!("api" / "config" / "chaser-callsigns")
        .and(warp::post())
        .and(json_body::<CallsignRequest>(JSON_BODY_LIMIT))
        .and(with_state(state.clone()))
        .map(|request: CallsignRequest, state: AppState| match request.callsign {
            Some(callsign) => {
                let result = state.config.add_chaser(&callsign);
                config_reply(&state, result)
            }
            None => bad_request("Callsign is required"),
        });

    let remove_chaser = warp::path!("api" / "config" / "chaser-callsigns" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .map(|callsign: String, state: AppState| {
            let result = state.config.remove_chaser(&callsign);
            config_reply(&state, result)
        });

    let detector = warp::path!("api" / "config" / "burst-detection")
        .and(warp::put())
        .and(json_body::<DetectorPatch>(JSON_BODY_LIMIT))
        .and(with_state(state.clone()))
        .map(|patch: DetectorPatch, state: AppState| {
            let mut detector = state.config.get().detector;
            if let Some(value) = patch.min_altitude_to_start {
                detector.min_altitude_to_start = value;
            }
            if let Some(value) = patch.significant_drop {
                detector.significant_drop = value;
            }
            if let Some(value) = patch.required_descent_points {
                detector.required_descent_points = value;
            }
            let result = state.config.set_detector(detector);
            config_reply(&state, result)
        });

    let interval = warp::path!("api" / "config" / "update-interval")
        .and(warp::put())
        .and(json_body::<IntervalRequest>(JSON_BODY_LIMIT))
        .and(with_state(state.clone()))
        .map(|request: IntervalRequest, state: AppState| match request.interval_secs {
            Some(secs) => {
                let result = state.config.set_update_interval(secs);
                config_reply(&state, result)
            }
            None => bad_request("intervalSecs is required"),
        });

    let reset = warp::path!("api" / "config" / "reset")
        .and(warp::post())
        .and(with_state(state))
        .map(|state: AppState| {
            let result = state.config.reset();
            config_reply(&state, result)
        });

    get.or(merge)
        .or(balloon)
        .or(add_chaser)
        .or(remove_chaser)
        .or(detector)
        .or(interval)
        .or(reset)
}

/// Every API route, with rejections turned into JSON errors.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    tracking_routes(state.clone())
        .or(kml_routes(state.clone()))
        .or(config_routes(state))
        .recover(handle_rejection)
        .with(warp::log("tracker::api"))
}

async fn handle_rejection(err: Rejection) -> Result<WithStatus<Json>, Infallible> {
    let reply = if err.is_not_found() {
        error(StatusCode::NOT_FOUND, "Endpoint not found")
    } else if let Some(body) = err.find::<warp::filters::body::BodyDeserializeError>() {
        bad_request(body)
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        warn!("unhandled rejection: {:?}", err);
        error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };
    Ok(reply)
}

/// Serves the API on `addr` until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .with_context(|| format!("binding HTTP API on {addr}"))?;
    info!("HTTP API listening on http://{bound}");
    server.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use habcore::interface::PositionSample;

    const KML: &str = r#"<kml><Document>
        <Placemark><name>Burst</name><Point><coordinates>-85.3,33.6,30000</coordinates></Point></Placemark>
        <Placemark><name>Landing</name><Point><coordinates>-85.1,33.7,0</coordinates></Point></Placemark>
    </Document></kml>"#;

    fn state() -> AppState {
        AppState::new(
            Arc::new(TrackingSession::default()),
            Arc::new(ConfigStore::new(TrackerConfig::default(), None)),
            Arc::new(MetricsRecorder::new()),
        )
    }

    fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let api = routes(state());
        let response = warp::test::request().path("/api/health").reply(&api).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body(&response);
        assert_eq!(json["status"], "OK");
        assert_eq!(json["metrics"]["cycles"], 0);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let api = routes(state());
        let response = warp::test::request().path("/api/nowhere").reply(&api).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["error"], "Endpoint not found");
    }

    #[tokio::test]
    async fn kml_upload_sets_prediction_with_metrics() {
        let state = state();
        let api = routes(state.clone());
        let response = warp::test::request()
            .method("POST")
            .path("/api/kml/content")
            .json(&json!({ "kmlContent": KML }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = warp::test::request()
            .path("/api/tracking/prediction")
            .reply(&api)
            .await;
        let json = body(&response);
        assert_eq!(json["burstPoint"]["latitude"], 33.6);
        assert!(json["metrics"]["distance"].as_f64().unwrap() > 0.0);

        let response = warp::test::request()
            .method("DELETE")
            .path("/api/kml")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = warp::test::request().path("/api/kml").reply(&api).await;
        assert!(body(&response).is_null());
    }

    #[tokio::test]
    async fn kml_upload_requires_content() {
        let api = routes(state());
        let response = warp::test::request()
            .method("POST")
            .path("/api/kml/content")
            .json(&json!({}))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"], "KML content is required");

        let response = warp::test::request()
            .method("POST")
            .path("/api/kml/content")
            .json(&json!({ "kmlContent": "<html/>" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn calculate_metrics_and_landing() {
        let api = routes(state());
        let response = warp::test::request()
            .method("POST")
            .path("/api/kml/calculate-metrics")
            .json(&json!({
                "burstPoint": { "latitude": 0.0, "longitude": 0.0 },
                "landingPoint": { "latitude": 0.0, "longitude": 1.0 }
            }))
            .reply(&api)
            .await;
        let metrics = body(&response);
        assert!((metrics["bearing"].as_f64().unwrap() - 90.0).abs() < 1e-6);

        let response = warp::test::request()
            .method("POST")
            .path("/api/kml/calculate-landing")
            .json(&json!({
                "actualBurstLat": 0.0,
                "actualBurstLon": 10.0,
                "predictionMetrics": metrics
            }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let point = body(&response);
        assert!((point["longitude"].as_f64().unwrap() - 11.0).abs() < 1e-6);
        assert!(point["latitude"].as_f64().unwrap().abs() < 1e-6);

        let response = warp::test::request()
            .method("POST")
            .path("/api/kml/calculate-landing")
            .json(&json!({ "actualBurstLat": 0.0 }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chaser_callsigns_are_added_and_removed() {
        let state = state();
        let api = routes(state.clone());
        let response = warp::test::request()
            .method("POST")
            .path("/api/config/chaser-callsigns")
            .json(&json!({ "callsign": "kd4abc-9" }))
            .reply(&api)
            .await;
        assert_eq!(body(&response)["chaserCallsigns"], json!(["KD4ABC-9"]));

        let response = warp::test::request()
            .method("DELETE")
            .path("/api/config/chaser-callsigns/KD4ABC-9")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.config.get().chaser_callsigns.is_empty());
    }

    #[tokio::test]
    async fn detector_update_reaches_live_flight() {
        let state = state();
        let api = routes(state.clone());
        let response = warp::test::request()
            .method("PUT")
            .path("/api/config/burst-detection")
            .json(&json!({ "significantDrop": 500.0 }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let live = state.session.flight().inspect(|flight| flight.detector_config());
        assert_eq!(live.significant_drop, 500.0);
        assert_eq!(live.min_altitude_to_start, 3000.0);

        let response = warp::test::request()
            .method("PUT")
            .path("/api/config/burst-detection")
            .json(&json!({ "significantDrop": -1.0 }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_interval_validates_input() {
        let api = routes(state());
        let response = warp::test::request()
            .method("PUT")
            .path("/api/config/update-interval")
            .json(&json!({ "intervalSecs": 0 }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = warp::test::request()
            .method("PUT")
            .path("/api/config/update-interval")
            .json(&json!({ "intervalSecs": 30 }))
            .reply(&api)
            .await;
        assert_eq!(body(&response)["updateIntervalSecs"], 30);
    }

    #[tokio::test]
    async fn burst_summary_and_reset() {
        let state = state();
        let api = routes(state.clone());
        let flight = state.session.flight();
        for (i, altitude) in [3200.0, 9000.0, 7900.0, 7700.0, 7500.0].into_iter().enumerate() {
            let at = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
            flight
                .append(PositionSample::new(33.6, -85.2, at).with_altitude(altitude))
                .unwrap();
        }

        let response = warp::test::request()
            .path("/api/tracking/burst")
            .reply(&api)
            .await;
        let json = body(&response);
        assert_eq!(json["burstDetected"], true);
        assert_eq!(json["actualBurstPoint"]["peakAltitude"], 9000.0);
        assert!(json["calculatedLanding"].is_null());

        let response = warp::test::request()
            .method("POST")
            .path("/api/tracking/reset")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = warp::test::request()
            .path("/api/tracking/balloon/history")
            .reply(&api)
            .await;
        assert_eq!(body(&response), json!([]));
    }
}
