//! Tern Simulation Library
//!
//! Synthetic flight profiles and sensor streams for exercising the
//! navigation filter end to end.

pub mod runner;
pub mod scenario;
pub mod sensor;

// Re-export main types
pub use runner::{run, RunConfig, RunResult};
pub use scenario::{generate, Maneuver, Trajectory};
pub use sensor::{generate_sensor_data, SensorConfig, SensorData};
