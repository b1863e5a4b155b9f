//! Synthetic sensor streams with Gaussian noise.

use crate::scenario::Trajectory;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tern_core::{GpsSample, ImuSample, Scalar, MAG_FIELD_GAUSS};

const EARTH_RADIUS: Scalar = 6_371_000.0;

pub struct SensorConfig {
    pub noise_scale: Scalar,
    pub accel_noise_std: Scalar,   // m/s^2
    pub gyro_noise_std: Scalar,    // rad/s
    pub mag_noise_std: Scalar,     // Gauss
    pub baro_noise_std: Scalar,    // meters
    pub gps_pos_noise_std: Scalar, // meters
    pub gps_vel_noise_std: Scalar, // m/s

    // Geodetic reference the truth trajectory is flown around.
    pub home_lat_deg: Scalar,
    pub home_lon_deg: Scalar,
    pub home_alt_m: Scalar,

    pub seed: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            noise_scale: 1.0,
            accel_noise_std: 0.01,
            gyro_noise_std: 0.001,
            mag_noise_std: 0.001,
            baro_noise_std: 0.1,
            gps_pos_noise_std: 1.0,
            gps_vel_noise_std: 0.1,
            home_lat_deg: 47.397,
            home_lon_deg: 8.545,
            home_alt_m: 488.0,
            seed: 42,
        }
    }
}

pub struct SensorData {
    /// One combined sample per trajectory step.
    pub imu: Vec<ImuSample>,
    /// One fix per `gps_every` steps, aligned with the IMU stamps.
    pub gps: Vec<GpsSample>,
}

/// Corrupt a truth trajectory into sensor streams. `gps_every` decimates the
/// fix rate relative to the IMU rate.
pub fn generate_sensor_data(traj: &Trajectory, cfg: &SensorConfig, gps_every: usize) -> SensorData {
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let d_accel = Normal::new(0.0, cfg.noise_scale * cfg.accel_noise_std).unwrap();
    let d_gyro = Normal::new(0.0, cfg.noise_scale * cfg.gyro_noise_std).unwrap();
    let d_mag = Normal::new(0.0, cfg.noise_scale * cfg.mag_noise_std).unwrap();
    let d_baro = Normal::new(0.0, cfg.noise_scale * cfg.baro_noise_std).unwrap();
    let d_gps_p = Normal::new(0.0, cfg.noise_scale * cfg.gps_pos_noise_std).unwrap();
    let d_gps_v = Normal::new(0.0, cfg.noise_scale * cfg.gps_vel_noise_std).unwrap();

    let mag_field_ned = Vector3::new(MAG_FIELD_GAUSS[0], MAG_FIELD_GAUSS[1], MAG_FIELD_GAUSS[2]);

    let n = traj.time.len();
    let mut data = SensorData {
        imu: Vec::with_capacity(n),
        gps: Vec::with_capacity(n / gps_every.max(1) + 1),
    };

    for i in 0..n {
        let t_us = (traj.time[i] * 1e6).round() as u64;

        let gyro = traj.gyro[i]
            + Vector3::new(
                d_gyro.sample(&mut rng),
                d_gyro.sample(&mut rng),
                d_gyro.sample(&mut rng),
            );
        let accel = traj.accel[i]
            + Vector3::new(
                d_accel.sample(&mut rng),
                d_accel.sample(&mut rng),
                d_accel.sample(&mut rng),
            );

        // rotate the NED field into the body frame
        let mag_body = traj.attitude[i].inverse_transform_vector(&mag_field_ned);
        let mag = mag_body
            + Vector3::new(
                d_mag.sample(&mut rng),
                d_mag.sample(&mut rng),
                d_mag.sample(&mut rng),
            );

        let baro_alt = cfg.home_alt_m - traj.pos_ned[i].z + d_baro.sample(&mut rng);

        data.imu.push(ImuSample {
            timestamp: t_us,
            accel_rel_t: 0,
            mag_rel_t: 0,
            baro_rel_t: 0,
            gyro,
            accel,
            mag,
            baro_alt,
            gyro_integral_dt: traj.dt,
        });

        if gps_every > 0 && (i + 1) % gps_every == 0 {
            let pos = traj.pos_ned[i]
                + Vector3::new(
                    d_gps_p.sample(&mut rng),
                    d_gps_p.sample(&mut rng),
                    d_gps_p.sample(&mut rng),
                );
            let vel = traj.vel_ned[i]
                + Vector3::new(
                    d_gps_v.sample(&mut rng),
                    d_gps_v.sample(&mut rng),
                    d_gps_v.sample(&mut rng),
                );

            let (lat_deg, lon_deg, alt_m) = ned_to_geodetic(&pos, cfg);
            data.gps.push(GpsSample {
                timestamp: t_us,
                lat: (lat_deg * 1e7).round() as i32,
                lon: (lon_deg * 1e7).round() as i32,
                alt: (alt_m * 1e3).round() as i32,
                vel_n: vel.x,
                vel_e: vel.y,
                vel_d: vel.z,
                satellites_used: 10,
                fix_type: 3,
            });
        }
    }

    data
}

/// Spherical-earth inverse of the filter's origin mapping, anchored at home.
fn ned_to_geodetic(pos: &Vector3<Scalar>, cfg: &SensorConfig) -> (Scalar, Scalar, Scalar) {
    let lat0 = cfg.home_lat_deg.to_radians();
    let lat = lat0 + pos.x / EARTH_RADIUS;
    let lon = cfg.home_lon_deg.to_radians() + pos.y / (EARTH_RADIUS * lat0.cos());
    let alt = cfg.home_alt_m - pos.z;
    (lat.to_degrees(), lon.to_degrees(), alt)
}

// ===========================================================================
// TESTS
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{generate, Maneuver};
    use approx::assert_relative_eq;

    #[test]
    fn test_streams_are_deterministic_per_seed() {
        let traj = generate(Maneuver::Hover, 1.0, 200.0);
        let cfg = SensorConfig::default();
        let a = generate_sensor_data(&traj, &cfg, 40);
        let b = generate_sensor_data(&traj, &cfg, 40);
        assert_eq!(a.imu.len(), b.imu.len());
        assert_relative_eq!(a.imu[7].accel.x, b.imu[7].accel.x);
        assert_eq!(a.gps.len(), 5);
        assert_eq!(a.gps[0].lat, b.gps[0].lat);
    }

    #[test]
    fn test_noiseless_hover_reads_gravity_and_home() {
        let traj = generate(Maneuver::Hover, 0.5, 200.0);
        let cfg = SensorConfig {
            noise_scale: 0.0,
            ..Default::default()
        };
        let data = generate_sensor_data(&traj, &cfg, 40);

        let imu = &data.imu[10];
        assert_relative_eq!(imu.accel.z, -tern_core::GRAVITY);
        assert_relative_eq!(imu.baro_alt, 488.0);

        let fix = &data.gps[0];
        assert_eq!(fix.lat, 473_970_000);
        assert_eq!(fix.lon, 85_450_000);
        assert_eq!(fix.alt, 488_000);
    }
}
