//! Landing re-estimation from the observed burst point.
//!
//! The prediction's burst-to-landing leg (distance and bearing) is replayed
//! from where the balloon actually burst. This assumes the predicted descent
//! drift holds even though burst happened somewhere else and at a different
//! altitude; it is a modeling approximation, not an accuracy bound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interface::{Prediction, PredictionMetrics};
use crate::math::geodesy::destination_point;
use crate::prelude::GeoPoint;
use crate::processing::burst::BurstEvent;

/// Landing estimate anchored on the actual burst location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectedLanding {
    pub latitude: f64,
    pub longitude: f64,
    pub computed_at: DateTime<Utc>,
    /// Distance and bearing replayed from the prediction.
    pub source_metrics: PredictionMetrics,
    /// Burst coordinates the estimate was anchored on.
    pub anchored_on: GeoPoint,
}

/// Replays a prediction's drift leg from an arbitrary start point.
pub fn replay_from(origin: GeoPoint, metrics: PredictionMetrics) -> GeoPoint {
    destination_point(
        origin.latitude,
        origin.longitude,
        metrics.distance,
        metrics.bearing,
    )
}

/// Corrected landing for `burst`, or `None` when the prediction lacks either endpoint.
///
/// Uses the prediction's cached metrics when present.
pub fn recompute(
    prediction: &Prediction,
    burst: &BurstEvent,
    computed_at: DateTime<Utc>,
) -> Option<CorrectedLanding> {
    let burst_point = prediction.burst_point.as_ref()?;
    let landing_point = prediction.landing_point.as_ref()?;
    let metrics = prediction
        .metrics
        .unwrap_or_else(|| PredictionMetrics::between(burst_point, landing_point));

    let anchored_on = GeoPoint::new(burst.latitude, burst.longitude);
    let landing = replay_from(anchored_on, metrics);
    Some(CorrectedLanding {
        latitude: landing.latitude,
        longitude: landing.longitude,
        computed_at,
        source_metrics: metrics,
        anchored_on,
    })
}
