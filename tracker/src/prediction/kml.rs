//! Flight predictions exported as KML by the usual balloon predictors.
//!
//! Placemarks are classified in order: burst keywords, landing keywords, a
//! `LineString` (the predicted path), then any remaining `Point` (a waypoint).
//! When several placemarks qualify as burst or landing the last one wins.

use anyhow::{bail, Context};
use habcore::interface::{Prediction, PredictionPoint};
use roxmltree::{Document, Node};
use std::fs;
use std::path::Path;

const BURST_WORDS: [&str; 3] = ["burst", "pop", "explosion"];
const LANDING_WORDS: [&str; 3] = ["landing", "touchdown", "impact"];

pub fn load_prediction<P: AsRef<Path>>(path: P) -> anyhow::Result<Prediction> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading prediction {}", path_ref.display()))?;
    parse_prediction(&contents).with_context(|| format!("parsing prediction {}", path_ref.display()))
}

/// Extracts burst, landing, path and waypoints; metrics are cached when both endpoints exist.
pub fn parse_prediction(kml: &str) -> anyhow::Result<Prediction> {
    let document = Document::parse(kml).context("prediction is not well-formed XML")?;
    let root = document.root_element();
    if !root.tag_name().name().eq_ignore_ascii_case("kml") {
        bail!("document has no <kml> root element");
    }

    let mut prediction = Prediction::default();
    for placemark in root.descendants().filter(|node| is_element(node, "Placemark")) {
        let name = child_text(placemark, "name");
        let description = child_text(placemark, "description");
        let haystack = format!("{name} {description}").to_lowercase();
        let point = || {
            geometry_coordinates(placemark, "Point")
                .and_then(|coords| parse_tuple(&coords))
                .map(|p| label(p, &name, &description))
        };

        if contains_any(&haystack, &BURST_WORDS) {
            if let Some(point) = point() {
                prediction.burst_point = Some(point);
            }
        } else if contains_any(&haystack, &LANDING_WORDS) {
            if let Some(point) = point() {
                prediction.landing_point = Some(point);
            }
        } else if let Some(coords) = geometry_coordinates(placemark, "LineString") {
            prediction.path = coords.split_whitespace().filter_map(parse_tuple).collect();
        } else if let Some(point) = point() {
            prediction.waypoints.push(point);
        }
    }

    prediction.refresh_metrics();
    log::debug!(
        "parsed prediction: burst={} landing={} path={} waypoints={}",
        prediction.burst_point.is_some(),
        prediction.landing_point.is_some(),
        prediction.path.len(),
        prediction.waypoints.len()
    );
    Ok(prediction)
}

/// Matches on the local name so both bare and `xmlns`-qualified documents work.
fn is_element(node: &Node, tag: &str) -> bool {
    node.is_element() && node.tag_name().name() == tag
}

/// Concatenated text and CDATA of the first direct child named `tag`; comments are skipped.
fn child_text(parent: Node, tag: &str) -> String {
    parent
        .children()
        .find(|node| is_element(node, tag))
        .map(text_content)
        .unwrap_or_default()
}

fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|node| node.is_text())
        .filter_map(|text| text.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// `<coordinates>` of the first `geometry` element anywhere under the placemark.
fn geometry_coordinates(placemark: Node, geometry: &str) -> Option<String> {
    placemark
        .descendants()
        .find(|node| is_element(node, geometry))?
        .descendants()
        .find(|node| is_element(node, "coordinates"))
        .map(text_content)
}

fn contains_any(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|word| haystack.contains(word))
}

/// KML tuples are `lon,lat[,alt]`.
fn parse_tuple(tuple: &str) -> Option<PredictionPoint> {
    let mut parts = tuple.trim().split(',').map(|part| part.trim().parse::<f64>());
    let longitude = parts.next()?.ok()?;
    let latitude = parts.next()?.ok()?;
    let altitude = match parts.next() {
        Some(value) => value.ok().filter(|alt| alt.is_finite()).unwrap_or(0.0),
        None => 0.0,
    };
    let point = PredictionPoint::new(latitude, longitude, altitude);
    point.position().is_valid().then_some(point)
}

fn label(mut point: PredictionPoint, name: &str, description: &str) -> PredictionPoint {
    if !name.is_empty() {
        point.name = Some(name.to_string());
    }
    if !description.is_empty() {
        point.description = Some(description.to_string());
    }
    point
}
