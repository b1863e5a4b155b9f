//! Shared linear Kalman update and the innovation gate table.

use nalgebra::{SMatrix, SVector};

use crate::state::{ErrorCovariance, ErrorVector, Scalar};

/// Upper-tail chi-square thresholds indexed by measurement dimension.
/// `BETA_TABLE[k]` gates a k-dimensional innovation; index 0 is unused.
pub const BETA_TABLE: [Scalar; 7] = [
    0.0,
    8.82050518214,
    12.094592431,
    13.9876612368,
    16.0875642296,
    17.8797700658,
    19.6465647819,
];

/// Result of a linear Kalman correction against the full error state.
///
/// `dp` is a covariance *decrement*; the caller adds it to the current `P`
/// and re-conditions. `beta` is the Mahalanobis-squared test statistic for
/// the innovation gate.
#[derive(Debug, Clone)]
pub struct Correction {
    pub dxe: ErrorVector,
    pub dp: ErrorCovariance,
    pub beta: Scalar,
}

/// Linear Kalman update for a `Y`-dimensional measurement.
///
/// Computes `S = H P Hᵀ + R`, `K = P Hᵀ S⁻¹`, `dxe = K r`,
/// `dP = -K H P`, `beta = rᵀ S⁻¹ r`. Returns `None` when the innovation
/// covariance is not invertible; the caller skips the update.
pub fn kalman_correct<const Y: usize>(
    p: &ErrorCovariance,
    h: &SMatrix<Scalar, Y, 15>,
    r_cov: &SMatrix<Scalar, Y, Y>,
    residual: &SVector<Scalar, Y>,
) -> Option<Correction> {
    let r = *residual;
    let s = h * p * h.transpose() + r_cov;
    let s_inv = s.try_inverse()?;
    let k = p * h.transpose() * s_inv;
    let dxe = k * r;
    let dp = -(k * h * p);
    let beta = (r.transpose() * s_inv * r)[(0, 0)];
    Some(Correction { dxe, dp, beta })
}

// ===========================================================================
// TESTS
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state;
    use approx::assert_relative_eq;

    #[test]
    fn test_beta_table_monotonic() {
        for k in 1..BETA_TABLE.len() {
            assert!(BETA_TABLE[k] > BETA_TABLE[k - 1]);
        }
    }

    #[test]
    fn test_scalar_update_closed_form() {
        // P(0,0) = 1, H picks state 0, R = 1  =>  S = 2, K = 0.5
        let mut p = ErrorCovariance::zeros();
        state::condition_covariance(&mut p); // diagonal floor
        p[(0, 0)] = 1.0;

        let mut h = SMatrix::<Scalar, 1, 15>::zeros();
        h[(0, 0)] = 1.0;
        let r_cov = SMatrix::<Scalar, 1, 1>::new(1.0);
        let residual = SVector::<Scalar, 1>::new(0.4);

        let corr = kalman_correct(&p, &h, &r_cov, &residual).unwrap();
        assert_relative_eq!(corr.dxe[0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(corr.dp[(0, 0)], -0.5, epsilon = 1e-12);
        assert_relative_eq!(corr.beta, 0.4 * 0.4 / 2.0, epsilon = 1e-12);
        // states the measurement does not touch are left alone
        assert_relative_eq!(corr.dxe[5], 0.0);
        assert_relative_eq!(corr.dp[(5, 5)], 0.0);
    }

    #[test]
    fn test_singular_innovation_is_rejected() {
        let p = ErrorCovariance::zeros();
        let h = SMatrix::<Scalar, 2, 15>::zeros();
        let r_cov = SMatrix::<Scalar, 2, 2>::zeros();
        let residual = SVector::<Scalar, 2>::new(1.0, 1.0);
        assert!(kalman_correct(&p, &h, &r_cov, &residual).is_none());
    }
}
