pub mod config;
pub mod runner;
pub mod session;
pub mod snapshot;
pub mod store;

pub use config::TrackerConfig;
pub use runner::IngestionRunner;
pub use session::TrackingSession;
pub use snapshot::SnapshotStore;
pub use store::ConfigStore;
