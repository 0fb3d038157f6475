pub mod model;
pub mod routes;

pub use routes::{serve, AppState};
