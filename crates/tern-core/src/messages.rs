//! Driver-facing message types.
//!
//! Inbound samples mirror what a combined-IMU driver and a GNSS driver
//! deliver; outbound messages are what a flight stack consumes. The filter
//! owns none of the transport: the driver calls
//! [`crate::filter::Iekf::handle_imu`] / [`crate::filter::Iekf::handle_gps`]
//! and forwards [`FilterOutputs`] wherever it likes.

use crate::state::Scalar;
use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// One combined IMU sample. Per-sensor timestamps are expressed relative to
/// `timestamp` so a single message can carry slightly skewed sensors.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    /// Sample time, microseconds.
    pub timestamp: u64,
    /// Accelerometer time relative to `timestamp`, microseconds.
    pub accel_rel_t: i64,
    /// Magnetometer time relative to `timestamp`, microseconds.
    pub mag_rel_t: i64,
    /// Barometer time relative to `timestamp`, microseconds.
    pub baro_rel_t: i64,
    /// Body angular rate, rad/s.
    pub gyro: Vector3<Scalar>,
    /// Body specific force, m/s².
    pub accel: Vector3<Scalar>,
    /// Body magnetic field, Gauss.
    pub mag: Vector3<Scalar>,
    /// Barometric altitude above sea level, m.
    pub baro_alt: Scalar,
    /// Gyro integration interval, seconds; prediction runs when positive.
    pub gyro_integral_dt: Scalar,
}

impl Default for ImuSample {
    fn default() -> Self {
        Self {
            timestamp: 0,
            accel_rel_t: 0,
            mag_rel_t: 0,
            baro_rel_t: 0,
            gyro: Vector3::zeros(),
            accel: Vector3::zeros(),
            mag: Vector3::zeros(),
            baro_alt: 0.0,
            gyro_integral_dt: 0.0,
        }
    }
}

/// One GNSS fix.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsSample {
    /// Fix time, microseconds.
    pub timestamp: u64,
    /// Latitude, degrees * 1e7.
    pub lat: i32,
    /// Longitude, degrees * 1e7.
    pub lon: i32,
    /// Altitude above sea level, millimeters.
    pub alt: i32,
    /// NED velocity, m/s.
    pub vel_n: Scalar,
    pub vel_e: Scalar,
    pub vel_d: Scalar,
    pub satellites_used: u8,
    pub fix_type: u8,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Attitude estimate with bias-corrected body rates.
#[derive(Debug, Clone, Copy)]
pub struct Attitude {
    pub timestamp: u64,
    /// Body→nav quaternion, scalar first.
    pub q: [Scalar; 4],
    pub rollspeed: Scalar,
    pub pitchspeed: Scalar,
    pub yawspeed: Scalar,
}

/// Local NED position/velocity with origin metadata.
#[derive(Debug, Clone, Copy)]
pub struct LocalPosition {
    pub timestamp: u64,
    pub xy_valid: bool,
    pub z_valid: bool,
    pub v_xy_valid: bool,
    pub v_z_valid: bool,
    pub x: Scalar,
    pub y: Scalar,
    pub z: Scalar,
    pub vx: Scalar,
    pub vy: Scalar,
    pub vz: Scalar,
    pub yaw: Scalar,
    pub xy_global: bool,
    pub z_global: bool,
    pub ref_timestamp: u64,
    pub ref_lat: Scalar,
    pub ref_lon: Scalar,
    pub ref_alt: Scalar,
    pub dist_bottom: Scalar,
    pub dist_bottom_rate: Scalar,
    pub dist_bottom_valid: bool,
    pub eph: Scalar,
    pub epv: Scalar,
}

/// Geodetic position derived through the latched origin.
#[derive(Debug, Clone, Copy)]
pub struct GlobalPosition {
    pub timestamp: u64,
    pub lat: Scalar,
    pub lon: Scalar,
    pub alt: Scalar,
    pub vel_n: Scalar,
    pub vel_e: Scalar,
    pub vel_d: Scalar,
    pub yaw: Scalar,
    pub eph: Scalar,
    pub epv: Scalar,
    pub terrain_alt: Scalar,
    pub terrain_alt_valid: bool,
    pub dead_reckoning: bool,
}

/// State feedback for the controllers.
#[derive(Debug, Clone, Copy)]
pub struct ControlState {
    pub timestamp: u64,
    /// Body specific acceleration with gravity removed, m/s².
    pub x_acc: Scalar,
    pub y_acc: Scalar,
    pub z_acc: Scalar,
    pub x_vel: Scalar,
    pub y_vel: Scalar,
    pub z_vel: Scalar,
    pub x_pos: Scalar,
    pub y_pos: Scalar,
    pub z_pos: Scalar,
    pub q: [Scalar; 4],
    pub roll_rate: Scalar,
    pub pitch_rate: Scalar,
    pub yaw_rate: Scalar,
    pub vel_variance: [Scalar; 3],
    pub pos_variance: [Scalar; 3],
}

/// Estimator introspection: state snapshot and covariance diagonal.
/// Test-ratio fields are placeholders until innovation bookkeeping lands.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorStatus {
    pub timestamp: u64,
    pub states: [Scalar; 16],
    pub n_states: usize,
    pub covariances: [Scalar; 15],
    pub pos_horiz_accuracy: Scalar,
    pub pos_vert_accuracy: Scalar,
    pub mag_test_ratio: Scalar,
    pub vel_test_ratio: Scalar,
    pub pos_test_ratio: Scalar,
    pub hgt_test_ratio: Scalar,
}

/// Everything published after one IMU callback.
#[derive(Debug, Clone, Copy)]
pub struct FilterOutputs {
    pub attitude: Attitude,
    pub local_position: LocalPosition,
    pub global_position: GlobalPosition,
    pub control_state: ControlState,
    pub estimator_status: EstimatorStatus,
}
