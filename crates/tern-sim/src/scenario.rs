//! Closed-form truth trajectories for exercising the filter.
//!
//! Each maneuver is simple enough to write down exactly: attitude, body
//! rates, specific force, NED velocity and position at every IMU sample.
//! The specific force is whatever a perfect accelerometer would read for
//! the commanded motion, so a filter fed these streams without noise should
//! reproduce the truth.

use nalgebra::{UnitQuaternion, Vector3};
use tern_core::{Scalar, GRAVITY};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Maneuver {
    /// Motionless hover at the reference point.
    Hover,
    /// Spin about body z at a constant rate (rad/s), otherwise motionless.
    YawSpin { rate: Scalar },
    /// Constant-rate climb (m/s, positive up), level attitude.
    Climb { rate: Scalar },
}

pub struct Trajectory {
    pub dt: Scalar,
    pub time: Vec<Scalar>,
    /// Body→nav attitude.
    pub attitude: Vec<UnitQuaternion<Scalar>>,
    /// Body angular rate, rad/s.
    pub gyro: Vec<Vector3<Scalar>>,
    /// Body specific force, m/s².
    pub accel: Vec<Vector3<Scalar>>,
    pub vel_ned: Vec<Vector3<Scalar>>,
    pub pos_ned: Vec<Vector3<Scalar>>,
}

/// Sample a maneuver at `rate_hz` for `duration_s` seconds.
pub fn generate(maneuver: Maneuver, duration_s: Scalar, rate_hz: Scalar) -> Trajectory {
    let dt = 1.0 / rate_hz;
    let steps = (duration_s * rate_hz) as usize;
    let g_n = Vector3::new(0.0, 0.0, -GRAVITY);

    let mut traj = Trajectory {
        dt,
        time: Vec::with_capacity(steps),
        attitude: Vec::with_capacity(steps),
        gyro: Vec::with_capacity(steps),
        accel: Vec::with_capacity(steps),
        vel_ned: Vec::with_capacity(steps),
        pos_ned: Vec::with_capacity(steps),
    };

    for k in 1..=steps {
        let t = k as Scalar * dt;

        let (attitude, gyro, vel_ned, pos_ned) = match maneuver {
            Maneuver::Hover => (
                UnitQuaternion::identity(),
                Vector3::zeros(),
                Vector3::zeros(),
                Vector3::zeros(),
            ),
            Maneuver::YawSpin { rate } => (
                UnitQuaternion::from_euler_angles(0.0, 0.0, rate * t),
                Vector3::new(0.0, 0.0, rate),
                Vector3::zeros(),
                Vector3::zeros(),
            ),
            Maneuver::Climb { rate } => (
                UnitQuaternion::identity(),
                Vector3::zeros(),
                Vector3::new(0.0, 0.0, -rate),
                Vector3::new(0.0, 0.0, -rate * t),
            ),
        };

        // unaccelerated flight: the accelerometer sees gravity in body axes
        let accel = attitude.inverse_transform_vector(&g_n);

        traj.time.push(t);
        traj.attitude.push(attitude);
        traj.gyro.push(gyro);
        traj.accel.push(accel);
        traj.vel_ned.push(vel_ned);
        traj.pos_ned.push(pos_ned);
    }

    traj
}

// ===========================================================================
// TESTS
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hover_is_motionless() {
        let traj = generate(Maneuver::Hover, 1.0, 200.0);
        assert_eq!(traj.time.len(), 200);
        assert_relative_eq!(traj.pos_ned[199].norm(), 0.0);
        assert_relative_eq!(traj.accel[0].z, -GRAVITY);
    }

    #[test]
    fn test_yaw_spin_rotates_field_not_gravity() {
        let traj = generate(Maneuver::YawSpin { rate: 1.0 }, 1.0, 100.0);
        // gravity stays on body z under pure yaw
        assert_relative_eq!(traj.accel[50].z, -GRAVITY, epsilon = 1e-9);
        assert_relative_eq!(traj.accel[50].x, 0.0, epsilon = 1e-9);
        let (_, _, yaw) = traj.attitude[99].euler_angles();
        assert_relative_eq!(yaw, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_climb_integrates_position() {
        let traj = generate(Maneuver::Climb { rate: 2.0 }, 5.0, 100.0);
        let last = traj.pos_ned.last().unwrap();
        assert_relative_eq!(last.z, -10.0, epsilon = 1e-9);
        assert_relative_eq!(traj.vel_ned[0].z, -2.0);
    }
}
