pub mod kml;

pub use kml::{load_prediction, parse_prediction};
