//! State-space layout and numerical guards for the navigation filter.
//!
//! The nominal state lives on a manifold (unit quaternion + Euclidean
//! states, 16 scalars) while the error state is a flat 15-vector in the
//! tangent space. Both are indexed positionally; the index modules below
//! are the single source of truth for the layout.

use log::info;
use nalgebra::{Matrix3, Quaternion, SMatrix, SVector, Vector3};

pub type Scalar = f64;

/// Nominal state indices (`x`, 16 scalars).
pub mod xi {
    pub const Q_NB_0: usize = 0;
    pub const Q_NB_1: usize = 1;
    pub const Q_NB_2: usize = 2;
    pub const Q_NB_3: usize = 3;
    pub const VEL_N: usize = 4;
    pub const VEL_E: usize = 5;
    pub const VEL_D: usize = 6;
    pub const GYRO_BIAS_BX: usize = 7;
    pub const GYRO_BIAS_BY: usize = 8;
    pub const GYRO_BIAS_BZ: usize = 9;
    pub const ACCEL_SCALE: usize = 10;
    pub const POS_N: usize = 11;
    pub const POS_E: usize = 12;
    pub const POS_D: usize = 13;
    pub const TERRAIN_ALT: usize = 14;
    pub const BARO_BIAS: usize = 15;
    pub const N: usize = 16;
}

/// Error state indices (`xe`, 15 scalars). Attitude contributes a 3-dim
/// small-angle rotation error in the nav frame, gyro-bias error is likewise
/// expressed in nav axes.
pub mod xe {
    pub const ROT_N: usize = 0;
    pub const ROT_E: usize = 1;
    pub const ROT_D: usize = 2;
    pub const VEL_N: usize = 3;
    pub const VEL_E: usize = 4;
    pub const VEL_D: usize = 5;
    pub const GYRO_BIAS_N: usize = 6;
    pub const GYRO_BIAS_E: usize = 7;
    pub const GYRO_BIAS_D: usize = 8;
    pub const ACCEL_SCALE: usize = 9;
    pub const POS_N: usize = 10;
    pub const POS_E: usize = 11;
    pub const POS_D: usize = 12;
    pub const TERRAIN_ALT: usize = 13;
    pub const BARO_BIAS: usize = 14;
    pub const N: usize = 15;
}

/// IMU input indices (`u`, 6 scalars).
pub mod ui {
    pub const OMEGA_NB_BX: usize = 0;
    pub const OMEGA_NB_BY: usize = 1;
    pub const OMEGA_NB_BZ: usize = 2;
    pub const ACCEL_BX: usize = 3;
    pub const ACCEL_BY: usize = 4;
    pub const ACCEL_BZ: usize = 5;
    pub const N: usize = 6;
}

pub type StateVector = SVector<Scalar, 16>;
pub type ErrorVector = SVector<Scalar, 15>;
pub type InputVector = SVector<Scalar, 6>;
pub type ErrorCovariance = SMatrix<Scalar, 15, 15>;

/// Renormalize the nominal quaternion once its norm drifts past this.
pub const QUAT_NORM_TOL: Scalar = 1e-3;

/// Covariance diagonal floor.
pub const P_DIAG_MIN: Scalar = 1e-6;

/// Covariance magnitude cap.
pub const P_MAX: Scalar = 1e9;

// ---------------------------------------------------------------------------
// Initial values
// ---------------------------------------------------------------------------

/// Identity attitude, unit accel scale, everything else zero.
pub fn initial_state() -> StateVector {
    let mut x = StateVector::zeros();
    x[xi::Q_NB_0] = 1.0;
    x[xi::ACCEL_SCALE] = 1.0;
    x
}

/// Diagonal covariance seed. Velocity, position, terrain and baro-bias start
/// effectively unknown; attitude and gyro bias start loosely known.
pub fn initial_covariance() -> ErrorCovariance {
    let mut p = ErrorCovariance::zeros();
    p[(xe::ROT_N, xe::ROT_N)] = 10.0;
    p[(xe::ROT_E, xe::ROT_E)] = 10.0;
    p[(xe::ROT_D, xe::ROT_D)] = 100.0;
    p[(xe::VEL_N, xe::VEL_N)] = 1e9;
    p[(xe::VEL_E, xe::VEL_E)] = 1e9;
    p[(xe::VEL_D, xe::VEL_D)] = 1e9;
    p[(xe::GYRO_BIAS_N, xe::GYRO_BIAS_N)] = 1e-3;
    p[(xe::GYRO_BIAS_E, xe::GYRO_BIAS_E)] = 1e-3;
    p[(xe::GYRO_BIAS_D, xe::GYRO_BIAS_D)] = 1e-3;
    p[(xe::ACCEL_SCALE, xe::ACCEL_SCALE)] = 1e-1;
    p[(xe::POS_N, xe::POS_N)] = 1e9;
    p[(xe::POS_E, xe::POS_E)] = 1e9;
    p[(xe::POS_D, xe::POS_D)] = 1e9;
    p[(xe::TERRAIN_ALT, xe::TERRAIN_ALT)] = 1e9;
    p[(xe::BARO_BIAS, xe::BARO_BIAS)] = 1e9;
    p
}

// ---------------------------------------------------------------------------
// Quaternion helpers
// ---------------------------------------------------------------------------

/// Read the body→nav quaternion out of the nominal state (scalar-first).
pub fn quat_of(x: &StateVector) -> Quaternion<Scalar> {
    Quaternion::new(x[xi::Q_NB_0], x[xi::Q_NB_1], x[xi::Q_NB_2], x[xi::Q_NB_3])
}

pub fn set_quat(x: &mut StateVector, q: &Quaternion<Scalar>) {
    x[xi::Q_NB_0] = q.w;
    x[xi::Q_NB_1] = q.i;
    x[xi::Q_NB_2] = q.j;
    x[xi::Q_NB_3] = q.k;
}

/// Rotate a body-frame vector into the nav frame: `q v q*`.
pub fn rotate_to_nav(q: Quaternion<Scalar>, v: &Vector3<Scalar>) -> Vector3<Scalar> {
    (q * Quaternion::from_imag(*v) * q.conjugate()).imag()
}

/// Rotate a nav-frame vector into the body frame: `q* v q`.
pub fn rotate_to_body(q: Quaternion<Scalar>, v: &Vector3<Scalar>) -> Vector3<Scalar> {
    (q.conjugate() * Quaternion::from_imag(*v) * q).imag()
}

/// Skew-symmetric cross-product matrix, `skew(v) * w == v × w`.
pub fn skew(v: &Vector3<Scalar>) -> Matrix3<Scalar> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

// ---------------------------------------------------------------------------
// Nominal state bounder
// ---------------------------------------------------------------------------

/// Saturate every nominal-state element and repair non-finite entries.
///
/// Quaternion components are bounded loosely at ±2 so that saturation does
/// not flip the direction of the vector part; renormalization in the
/// predictor handles small norm errors. `gyro_bias_limit` is the symmetric
/// bound on the body-frame gyro biases (0 freezes them at zero).
pub fn bound_state(x: &mut StateVector, gyro_bias_limit: Scalar) {
    let b = gyro_bias_limit;
    let lower: [Scalar; xi::N] = [
        -2.0, -2.0, -2.0, -2.0, // q_nb
        -100.0, -100.0, -100.0, // vel
        -b, -b, -b, // gyro bias
        0.8,  // accel scale
        -1e9, -1e9, -1e9, // pos
        -1e6, // terrain alt
        -1e6, // baro bias
    ];
    let upper: [Scalar; xi::N] = [
        2.0, 2.0, 2.0, 2.0,
        100.0, 100.0, 100.0,
        b, b, b,
        1.5,
        1e9, 1e9, 1e9,
        1e6,
        1e6,
    ];

    for i in 0..xi::N {
        if !x[i].is_finite() {
            info!("x({}) not finite, setting to 0", i);
            x[i] = 0.0;
        }

        if x[i] < lower[i] {
            x[i] = lower[i];
        } else if x[i] > upper[i] {
            x[i] = upper[i];
        }
    }
}

// ---------------------------------------------------------------------------
// Covariance conditioner
// ---------------------------------------------------------------------------

/// Repair and symmetrize the error covariance in place.
///
/// Scans the lower triangle: non-finite entries become 0, entries above
/// [`P_MAX`] are clamped, diagonal entries below [`P_DIAG_MIN`] are raised.
/// The lower triangle is then mirrored into the upper so symmetry holds
/// bitwise.
pub fn condition_covariance(p: &mut ErrorCovariance) {
    for i in 0..xe::N {
        for j in 0..=i {
            if !p[(i, j)].is_finite() {
                info!("P({}, {}) not finite, setting to 0", i, j);
                p[(i, j)] = 0.0;
            }

            if p[(i, j)] > P_MAX {
                p[(i, j)] = P_MAX;
            }
        }

        if p[(i, i)] < P_DIAG_MIN {
            info!("P({}, {}) below floor, raising", i, i);
            p[(i, i)] = P_DIAG_MIN;
        }

        for j in 0..i {
            p[(j, i)] = p[(i, j)];
        }
    }
}

// ===========================================================================
// TESTS
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initial_state_seed() {
        let x = initial_state();
        assert_relative_eq!(x[xi::Q_NB_0], 1.0);
        assert_relative_eq!(x[xi::ACCEL_SCALE], 1.0);
        assert_relative_eq!(x.fixed_rows::<3>(xi::VEL_N).norm(), 0.0);
    }

    #[test]
    fn test_bound_saturates_velocity() {
        let mut x = initial_state();
        x[xi::VEL_N] = 150.0;
        x[xi::VEL_D] = -250.0;
        bound_state(&mut x, 0.0);
        assert_relative_eq!(x[xi::VEL_N], 100.0);
        assert_relative_eq!(x[xi::VEL_D], -100.0);
    }

    #[test]
    fn test_bound_repairs_non_finite() {
        let mut x = initial_state();
        x[xi::POS_E] = Scalar::NAN;
        x[xi::VEL_E] = Scalar::INFINITY;
        bound_state(&mut x, 0.0);
        assert_relative_eq!(x[xi::POS_E], 0.0);
        assert_relative_eq!(x[xi::VEL_E], 0.0);
    }

    #[test]
    fn test_bound_accel_scale_window() {
        let mut x = initial_state();
        x[xi::ACCEL_SCALE] = 0.5;
        bound_state(&mut x, 0.0);
        assert_relative_eq!(x[xi::ACCEL_SCALE], 0.8);
        x[xi::ACCEL_SCALE] = 3.0;
        bound_state(&mut x, 0.0);
        assert_relative_eq!(x[xi::ACCEL_SCALE], 1.5);
    }

    #[test]
    fn test_bound_gyro_bias_tunable() {
        let mut x = initial_state();
        x[xi::GYRO_BIAS_BX] = 0.01;
        bound_state(&mut x, 0.0);
        assert_relative_eq!(x[xi::GYRO_BIAS_BX], 0.0);

        x[xi::GYRO_BIAS_BX] = 0.01;
        bound_state(&mut x, 0.05);
        assert_relative_eq!(x[xi::GYRO_BIAS_BX], 0.01);

        x[xi::GYRO_BIAS_BX] = 0.2;
        bound_state(&mut x, 0.05);
        assert_relative_eq!(x[xi::GYRO_BIAS_BX], 0.05);
    }

    #[test]
    fn test_condition_floor_cap_and_symmetry() {
        let mut p = initial_covariance();
        p[(xe::POS_N, xe::POS_N)] = 1e12;
        p[(xe::VEL_N, xe::VEL_N)] = 1e-9;
        p[(xe::ROT_N, xe::ROT_E)] = Scalar::NAN;
        p[(xe::POS_E, xe::ROT_N)] = 3.0;
        condition_covariance(&mut p);

        assert_relative_eq!(p[(xe::POS_N, xe::POS_N)], P_MAX);
        assert_relative_eq!(p[(xe::VEL_N, xe::VEL_N)], P_DIAG_MIN);
        // NaN in the upper triangle is overwritten by the mirrored lower entry
        assert!(p[(xe::ROT_N, xe::ROT_E)].is_finite());
        assert_eq!(p, p.transpose());
        assert_relative_eq!(p[(xe::ROT_N, xe::POS_E)], 3.0);
    }

    #[test]
    fn test_rotation_helpers_round_trip() {
        // 90 degrees about z: body x maps to nav y for q = (cos45, 0, 0, sin45)
        let q = Quaternion::new(
            (0.25_f64 * core::f64::consts::PI).cos(),
            0.0,
            0.0,
            (0.25_f64 * core::f64::consts::PI).sin(),
        );
        let v = Vector3::new(1.0, 0.0, 0.0);
        let n = rotate_to_nav(q, &v);
        assert_relative_eq!(n.y, 1.0, epsilon = 1e-12);
        let back = rotate_to_body(q, &n);
        assert_relative_eq!(back.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_skew_matches_cross_product() {
        let a = Vector3::new(0.3, -1.2, 2.0);
        let b = Vector3::new(-0.7, 0.4, 0.9);
        assert_relative_eq!((skew(&a) * b - a.cross(&b)).norm(), 0.0, epsilon = 1e-15);
    }
}
