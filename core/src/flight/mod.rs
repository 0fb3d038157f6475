pub mod handle;
pub mod state;
pub mod view;

pub use handle::FlightHandle;
pub use state::FlightState;
pub use view::FlightStateView;
