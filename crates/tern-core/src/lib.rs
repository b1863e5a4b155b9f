//! # Tern Core
//!
//! Invariant extended Kalman filter core for small-UAV strapdown
//! navigation, designed to run on the flight controller:
//! - 16-state nominal / 15-state error-state filter on the unit quaternion
//! - IMU-driven prediction, accel/mag/baro/GNSS correctors
//! - Chi-square innovation gating (advisory) and covariance conditioning
//! - Lazily latched navigation origin
//!
//! # Features
//! - `std`: Enable standard library support (for testing)
//! - Default: `no_std` with no allocations (bare metal embedded)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod filter;
pub mod kalman;
pub mod messages;
pub mod origin;
pub mod state;

// Re-export core types
pub use filter::{FilterConfig, FilterStatus, Iekf, ImuReport, GRAVITY, MAG_FIELD_GAUSS};
pub use messages::{FilterOutputs, GpsSample, ImuSample};
pub use origin::NavOrigin;
pub use state::Scalar;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
