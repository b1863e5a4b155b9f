//! Drive the filter over a synthetic flight and collect the results.

use crate::scenario::{generate, Maneuver, Trajectory};
use crate::sensor::{generate_sensor_data, SensorConfig};
use nalgebra::Vector3;
use tern_core::{FilterConfig, Iekf, Scalar};

pub struct RunConfig {
    pub maneuver: Maneuver,
    pub duration_s: Scalar,
    pub imu_rate_hz: Scalar,
    /// IMU samples per GPS fix.
    pub gps_every: usize,
    pub sensors: SensorConfig,
    pub filter: FilterConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            maneuver: Maneuver::Hover,
            duration_s: 10.0,
            imu_rate_hz: 200.0,
            gps_every: 40, // 5 Hz
            sensors: SensorConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

pub struct RunResult {
    pub time: Vec<Scalar>,
    pub truth_pos: Vec<Vector3<Scalar>>,
    pub est_pos: Vec<Vector3<Scalar>>,
    pub truth_vel: Vec<Vector3<Scalar>>,
    pub est_vel: Vec<Vector3<Scalar>>,
    pub truth_yaw: Vec<Scalar>,
    pub est_yaw: Vec<Scalar>,
    pub eph: Vec<Scalar>,
}

impl RunResult {
    pub fn final_pos_error(&self) -> Vector3<Scalar> {
        self.est_pos.last().copied().unwrap_or_else(Vector3::zeros)
            - self.truth_pos.last().copied().unwrap_or_else(Vector3::zeros)
    }

    pub fn final_vel_error(&self) -> Vector3<Scalar> {
        self.est_vel.last().copied().unwrap_or_else(Vector3::zeros)
            - self.truth_vel.last().copied().unwrap_or_else(Vector3::zeros)
    }

    pub fn final_yaw_error(&self) -> Scalar {
        match (self.est_yaw.last(), self.truth_yaw.last()) {
            (Some(e), Some(t)) => wrap_pi(e - t),
            _ => 0.0,
        }
    }
}

fn wrap_pi(angle: Scalar) -> Scalar {
    let mut a = angle % core::f64::consts::TAU;
    if a > core::f64::consts::PI {
        a -= core::f64::consts::TAU;
    } else if a < -core::f64::consts::PI {
        a += core::f64::consts::TAU;
    }
    a
}

/// Run one scenario end to end and collect truth vs. estimate.
pub fn run(cfg: &RunConfig) -> RunResult {
    let traj = generate(cfg.maneuver, cfg.duration_s, cfg.imu_rate_hz);
    let data = generate_sensor_data(&traj, &cfg.sensors, cfg.gps_every);
    run_with_data(&traj, cfg, &data.imu, &data.gps)
}

fn run_with_data(
    traj: &Trajectory,
    cfg: &RunConfig,
    imu: &[tern_core::ImuSample],
    gps: &[tern_core::GpsSample],
) -> RunResult {
    let mut filter = Iekf::new(cfg.filter);

    let n = traj.time.len();
    let mut result = RunResult {
        time: Vec::with_capacity(n),
        truth_pos: Vec::with_capacity(n),
        est_pos: Vec::with_capacity(n),
        truth_vel: Vec::with_capacity(n),
        est_vel: Vec::with_capacity(n),
        truth_yaw: Vec::with_capacity(n),
        est_yaw: Vec::with_capacity(n),
        eph: Vec::with_capacity(n),
    };

    let mut next_gps = 0;
    for i in 0..n {
        filter.handle_imu(&imu[i]);

        if next_gps < gps.len() && gps[next_gps].timestamp <= imu[i].timestamp {
            filter.handle_gps(&gps[next_gps]);
            next_gps += 1;
        }

        let out = filter.outputs();
        result.time.push(traj.time[i]);
        result.truth_pos.push(traj.pos_ned[i]);
        result
            .est_pos
            .push(Vector3::new(out.local_position.x, out.local_position.y, out.local_position.z));
        result.truth_vel.push(traj.vel_ned[i]);
        result
            .est_vel
            .push(Vector3::new(out.local_position.vx, out.local_position.vy, out.local_position.vz));
        let (_, _, truth_yaw) = traj.attitude[i].euler_angles();
        result.truth_yaw.push(truth_yaw);
        result.est_yaw.push(out.local_position.yaw);
        result.eph.push(out.local_position.eph);
    }

    result
}

// ===========================================================================
// TESTS
// ===========================================================================
