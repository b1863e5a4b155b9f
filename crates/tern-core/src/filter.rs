//! Invariant extended Kalman filter for strapdown inertial navigation.
//!
//! The filter keeps a 16-scalar nominal state (body→nav quaternion, NED
//! velocity and position, body gyro bias, accelerometer scale, terrain
//! altitude, barometer bias) and a 15-dim error state whose attitude block
//! is a small-angle rotation in the nav frame. IMU samples drive prediction
//! and the accel/mag/baro correctors; GNSS fixes drive the position/velocity
//! corrector and latch the navigation origin.
//!
//! Formulation after Bonnabel/Martin/Salaün, "Invariant Extended Kalman
//! Filter: theory and application to a velocity-aided attitude estimation
//! problem".

use log::{info, warn};
use nalgebra::{Matrix1, Quaternion, SMatrix, UnitQuaternion, Vector1, Vector3};

use crate::kalman::{self, BETA_TABLE};
use crate::messages::{
    Attitude, ControlState, EstimatorStatus, FilterOutputs, GlobalPosition, GpsSample, ImuSample,
    LocalPosition,
};
use crate::origin::NavOrigin;
use crate::state::{
    self, xe, xi, ui, ErrorCovariance, ErrorVector, InputVector, Scalar, StateVector,
    QUAT_NORM_TOL,
};

/// Gravity magnitude used throughout, m/s².
pub const GRAVITY: Scalar = 9.8;

/// Default nav-frame magnetic field seed, Gauss. Only the direction is used.
pub const MAG_FIELD_GAUSS: [Scalar; 3] = [0.21523, 0.00771, -0.42741];

// Measurement dimensions, also the BETA_TABLE gate index per sensor.
const Y_ACCEL: usize = 3;
const Y_MAG: usize = 3;
const Y_BARO: usize = 1;
const Y_GPS: usize = 6;

// Accel corrector trusts the tilt assumption only this close to 1 g.
const ACCEL_GATE_M_S2: Scalar = 1.0;

// GPS acceptance thresholds.
const GPS_MIN_SATELLITES: u8 = 6;
const GPS_MIN_FIX_TYPE: u8 = 3;

// ---------------------------------------------------------------------------
// CONFIGURATION & STATUS
// ---------------------------------------------------------------------------

/// Compile-time constants cover the noise model; the few quantities a
/// vehicle integrator legitimately wants to move live here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    /// Nav-frame magnetic field reference. A production deployment would
    /// derive this from declination/inclination at the latched origin.
    pub mag_reference: Vector3<Scalar>,
    /// Symmetric bound on the body gyro biases. The default of 0 freezes
    /// the nominal bias at zero even though the error state estimates it.
    pub gyro_bias_limit: Scalar,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mag_reference: Vector3::new(
                MAG_FIELD_GAUSS[0],
                MAG_FIELD_GAUSS[1],
                MAG_FIELD_GAUSS[2],
            ),
            gyro_bias_limit: 0.0,
        }
    }
}

/// Outcome of one corrector pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStatus {
    /// Correction applied.
    Updated,
    /// Chi-square gate exceeded; the correction was applied anyway and the
    /// test statistic is carried for diagnostics.
    FaultDetected(Scalar),
    /// Measurement timestamp has not advanced.
    NoNewData,
    /// Measurement timestamp went backwards.
    OutOfOrder,
    /// Specific-force magnitude too far from gravity to trust tilt.
    Accelerating,
    /// GPS fix quality below the acceptance threshold.
    PoorFix,
    /// Innovation covariance not invertible; correction skipped.
    SingularInnovation,
}

impl FilterStatus {
    /// True when the corrector changed the state (faulted or not).
    pub fn applied(self) -> bool {
        matches!(self, Self::Updated | Self::FaultDetected(_))
    }
}

/// Per-stage outcomes of one IMU callback.
#[derive(Debug, Clone, Copy)]
pub struct ImuReport {
    pub predicted: bool,
    pub accel: FilterStatus,
    pub mag: FilterStatus,
    pub baro: FilterStatus,
}

// ---------------------------------------------------------------------------
// MAIN FILTER
// ---------------------------------------------------------------------------

pub struct Iekf {
    x: StateVector,
    p: ErrorCovariance,
    u: InputVector,
    g_n: Vector3<Scalar>,
    b_n: Vector3<Scalar>,
    config: FilterConfig,
    origin: NavOrigin,
    timestamp_imu: u64,
    timestamp_accel: i64,
    timestamp_mag: i64,
    timestamp_baro: i64,
    timestamp_gps: u64,
}

impl Default for Iekf {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl Iekf {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            x: state::initial_state(),
            p: state::initial_covariance(),
            u: InputVector::zeros(),
            g_n: Vector3::new(0.0, 0.0, -GRAVITY),
            b_n: config.mag_reference,
            config,
            origin: NavOrigin::new(),
            timestamp_imu: 0,
            timestamp_accel: 0,
            timestamp_mag: 0,
            timestamp_baro: 0,
            timestamp_gps: 0,
        }
    }

    pub fn state(&self) -> &StateVector {
        &self.x
    }

    pub fn covariance(&self) -> &ErrorCovariance {
        &self.p
    }

    pub fn input(&self) -> &InputVector {
        &self.u
    }

    pub fn origin(&self) -> &NavOrigin {
        &self.origin
    }

    /// Replace the nominal state; the bounder runs before the write lands.
    pub fn set_x(&mut self, x: StateVector) {
        self.x = x;
        self.bound_x();
    }

    /// Replace the error covariance; the conditioner runs before the write
    /// lands, so symmetry, finiteness, floor and cap always hold.
    pub fn set_p(&mut self, p: ErrorCovariance) {
        self.p = p;
        state::condition_covariance(&mut self.p);
    }

    /// Cache the IMU input without running prediction or correction.
    pub fn set_input(&mut self, gyro: &Vector3<Scalar>, accel: &Vector3<Scalar>) {
        self.u[ui::OMEGA_NB_BX] = gyro.x;
        self.u[ui::OMEGA_NB_BY] = gyro.y;
        self.u[ui::OMEGA_NB_BZ] = gyro.z;
        self.u[ui::ACCEL_BX] = accel.x;
        self.u[ui::ACCEL_BY] = accel.y;
        self.u[ui::ACCEL_BZ] = accel.z;
    }

    // =====================================================================
    // DRIVER ENTRY POINTS
    // =====================================================================

    /// Process one combined IMU sample: refresh the input cache, predict
    /// over the gyro integration interval, then run the accel, mag and baro
    /// correctors in that order.
    pub fn handle_imu(&mut self, msg: &ImuSample) -> ImuReport {
        self.set_input(&msg.gyro, &msg.accel);
        self.timestamp_imu = msg.timestamp;

        let predicted = msg.gyro_integral_dt > 0.0;
        if predicted {
            self.predict(msg.gyro_integral_dt);
        }

        ImuReport {
            predicted,
            accel: self.correct_accel(msg),
            mag: self.correct_mag(msg),
            baro: self.correct_baro(msg),
        }
    }

    /// Process one GNSS fix.
    pub fn handle_gps(&mut self, msg: &GpsSample) -> FilterStatus {
        self.correct_gps(msg)
    }

    // =====================================================================
    // DYNAMICS & PREDICTION
    // =====================================================================

    /// Continuous-time derivative of the nominal state.
    pub fn dynamics(&self, x: &StateVector, u: &InputVector) -> StateVector {
        let q_nb = state::quat_of(x);
        let a_b = Vector3::new(u[ui::ACCEL_BX], u[ui::ACCEL_BY], u[ui::ACCEL_BZ]);
        let as_n = state::rotate_to_nav(q_nb, &(a_b / x[xi::ACCEL_SCALE])) - self.g_n;
        let gyro_bias_b = Vector3::new(
            x[xi::GYRO_BIAS_BX],
            x[xi::GYRO_BIAS_BY],
            x[xi::GYRO_BIAS_BZ],
        );
        let omega_nb_b = Vector3::new(
            u[ui::OMEGA_NB_BX],
            u[ui::OMEGA_NB_BY],
            u[ui::OMEGA_NB_BZ],
        );
        let dq_nb = q_nb * Quaternion::from_imag(omega_nb_b - gyro_bias_b) * 0.5;

        let mut dx = StateVector::zeros();
        dx[xi::Q_NB_0] = dq_nb.w;
        dx[xi::Q_NB_1] = dq_nb.i;
        dx[xi::Q_NB_2] = dq_nb.j;
        dx[xi::Q_NB_3] = dq_nb.k;
        dx.fixed_rows_mut::<3>(xi::VEL_N).copy_from(&as_n);
        dx[xi::POS_N] = x[xi::VEL_N];
        dx[xi::POS_E] = x[xi::VEL_E];
        dx[xi::POS_D] = x[xi::VEL_D];
        // biases, scale, terrain and baro bias are random walks
        dx
    }

    /// Advance the nominal state and error covariance by `dt` seconds using
    /// Euler integration of `f(x,u)` and `A P + P Aᵀ + Q`.
    pub fn predict(&mut self, dt: Scalar) {
        let mut q_nb = state::quat_of(&self.x);

        if (q_nb.norm() - 1.0).abs() > QUAT_NORM_TOL {
            info!("renormalizing quaternion, norm was {:.4}", q_nb.norm());
            q_nb = q_nb.normalize();
            state::set_quat(&mut self.x, &q_nb);
        }

        // process noise
        let mut q_mat = ErrorCovariance::zeros();
        q_mat[(xe::ROT_N, xe::ROT_N)] = 1e-1;
        q_mat[(xe::ROT_E, xe::ROT_E)] = 1e-1;
        q_mat[(xe::ROT_D, xe::ROT_D)] = 1e-1;
        q_mat[(xe::VEL_N, xe::VEL_N)] = 1e-1;
        q_mat[(xe::VEL_E, xe::VEL_E)] = 1e-1;
        q_mat[(xe::VEL_D, xe::VEL_D)] = 1e-1;
        q_mat[(xe::GYRO_BIAS_N, xe::GYRO_BIAS_N)] = 1e-4;
        q_mat[(xe::GYRO_BIAS_E, xe::GYRO_BIAS_E)] = 1e-4;
        q_mat[(xe::GYRO_BIAS_D, xe::GYRO_BIAS_D)] = 1e-4;
        q_mat[(xe::ACCEL_SCALE, xe::ACCEL_SCALE)] = 1e-2;
        q_mat[(xe::POS_N, xe::POS_N)] = 1e-1;
        q_mat[(xe::POS_E, xe::POS_E)] = 1e-1;
        q_mat[(xe::POS_D, xe::POS_D)] = 1e-1;
        q_mat[(xe::TERRAIN_ALT, xe::TERRAIN_ALT)] = 1e-1;
        q_mat[(xe::BARO_BIAS, xe::BARO_BIAS)] = 1e-1;

        // error-state system matrix
        let mut a = SMatrix::<Scalar, 15, 15>::zeros();

        // rotation error driven by gyro-bias error
        a[(xe::ROT_N, xe::GYRO_BIAS_N)] = -0.5;
        a[(xe::ROT_E, xe::GYRO_BIAS_E)] = -0.5;
        a[(xe::ROT_D, xe::GYRO_BIAS_D)] = -0.5;

        // velocity error driven by rotation and scale errors
        let a_b = Vector3::new(
            self.u[ui::ACCEL_BX],
            self.u[ui::ACCEL_BY],
            self.u[ui::ACCEL_BZ],
        );
        let j_a_n = state::rotate_to_nav(q_nb, &(a_b / self.x[xi::ACCEL_SCALE]));
        a.fixed_view_mut::<3, 3>(xe::VEL_N, xe::ROT_N)
            .copy_from(&(-state::skew(&j_a_n) * 2.0));
        for i in 0..3 {
            a[(xe::VEL_N + i, xe::ACCEL_SCALE)] = -j_a_n[i];
        }

        // gyro-bias error coupled back through the corrected rate
        let omega_nb_b = Vector3::new(
            self.u[ui::OMEGA_NB_BX],
            self.u[ui::OMEGA_NB_BY],
            self.u[ui::OMEGA_NB_BZ],
        );
        let gyro_bias_b = Vector3::new(
            self.x[xi::GYRO_BIAS_BX],
            self.x[xi::GYRO_BIAS_BY],
            self.x[xi::GYRO_BIAS_BZ],
        );
        let j_omega_n = state::rotate_to_nav(q_nb, &(omega_nb_b - gyro_bias_b));
        a.fixed_view_mut::<3, 3>(xe::GYRO_BIAS_N, xe::ROT_N)
            .copy_from(&state::skew(&j_omega_n));

        // position error integrates velocity error
        a[(xe::POS_N, xe::VEL_N)] = 1.0;
        a[(xe::POS_E, xe::VEL_E)] = 1.0;
        a[(xe::POS_D, xe::VEL_D)] = 1.0;

        let dx = self.dynamics(&self.x, &self.u) * dt;
        self.x += dx;
        self.bound_x();

        let dp = (a * self.p + self.p * a.transpose() + q_mat) * dt;
        self.set_p(self.p + dp);
    }

    // =====================================================================
    // CORRECTORS
    // =====================================================================

    /// Advance a per-sensor timestamp cache, yielding the inter-arrival gap
    /// in seconds. Duplicate stamps and backwards jumps skip the update.
    fn sensor_dt(cached: &mut i64, stamp: i64) -> Result<Scalar, FilterStatus> {
        if stamp == *cached {
            return Err(FilterStatus::NoNewData);
        }
        let dt = (stamp - *cached) as Scalar / 1e6;
        if dt < 0.0 {
            return Err(FilterStatus::OutOfOrder);
        }
        *cached = stamp;
        Ok(dt)
    }

    /// Tilt correction from the gravity direction seen by the accelerometer.
    fn correct_accel(&mut self, msg: &ImuSample) -> FilterStatus {
        let stamp = msg.timestamp as i64 + msg.accel_rel_t;
        let dt = match Self::sensor_dt(&mut self.timestamp_accel, stamp) {
            Ok(dt) => dt,
            Err(status) => return status,
        };

        let y_b = msg.accel / self.x[xi::ACCEL_SCALE];

        // don't correct while the vehicle is accelerating
        if (y_b.norm() - self.g_n.norm()).abs() > ACCEL_GATE_M_S2 {
            return FilterStatus::Accelerating;
        }

        let q_nb = state::quat_of(&self.x);
        let r = state::rotate_to_nav(q_nb, &y_b) - self.g_n;

        let mut r_cov = SMatrix::<Scalar, Y_ACCEL, Y_ACCEL>::zeros();
        r_cov.fill_diagonal(1.0 / dt);

        let mut h = SMatrix::<Scalar, Y_ACCEL, 15>::zeros();
        h.fixed_view_mut::<3, 3>(0, xe::ROT_N)
            .copy_from(&(state::skew(&self.g_n.normalize()) * 2.0));

        let Some(corr) = kalman::kalman_correct(&self.p, &h, &r_cov, &r) else {
            return FilterStatus::SingularInnovation;
        };

        let faulted = corr.beta > BETA_TABLE[Y_ACCEL];
        if faulted {
            warn!("accel fault, beta = {:.1}", corr.beta);
        }

        // accel cannot observe yaw
        let mut dxe = corr.dxe;
        dxe[xe::ROT_D] = 0.0;

        self.apply_error_correction(&dxe);
        self.set_p(self.p + corr.dp);

        if faulted {
            FilterStatus::FaultDetected(corr.beta)
        } else {
            FilterStatus::Updated
        }
    }

    /// Heading correction from the magnetic field direction.
    fn correct_mag(&mut self, msg: &ImuSample) -> FilterStatus {
        let stamp = msg.timestamp as i64 + msg.mag_rel_t;
        let dt = match Self::sensor_dt(&mut self.timestamp_mag, stamp) {
            Ok(dt) => dt,
            Err(status) => return status,
        };

        let q_nb = state::quat_of(&self.x);
        let y_b = msg.mag.normalize();
        let b_unit = self.b_n.normalize();
        let r = state::rotate_to_nav(q_nb, &y_b) - b_unit;

        // heavy down-axis noise keeps the magnetometer out of roll/pitch
        let mut r_cov = SMatrix::<Scalar, Y_MAG, Y_MAG>::zeros();
        r_cov[(0, 0)] = 1.0 / dt;
        r_cov[(1, 1)] = 1.0 / dt;
        r_cov[(2, 2)] = 100.0 / dt;

        let mut h = SMatrix::<Scalar, Y_MAG, 15>::zeros();
        h.fixed_view_mut::<3, 3>(0, xe::ROT_N)
            .copy_from(&(state::skew(&b_unit) * 2.0));

        let Some(corr) = kalman::kalman_correct(&self.p, &h, &r_cov, &r) else {
            return FilterStatus::SingularInnovation;
        };

        let faulted = corr.beta > BETA_TABLE[Y_MAG];
        if faulted {
            warn!("mag fault, beta = {:.1}", corr.beta);
        }

        // magnetometer corrects yaw only
        let mut dxe = corr.dxe;
        dxe[xe::ROT_N] = 0.0;
        dxe[xe::ROT_E] = 0.0;

        self.apply_error_correction(&dxe);
        self.set_p(self.p + corr.dp);

        if faulted {
            FilterStatus::FaultDetected(corr.beta)
        } else {
            FilterStatus::Updated
        }
    }

    /// Vertical correction from barometric altitude.
    fn correct_baro(&mut self, msg: &ImuSample) -> FilterStatus {
        let stamp = msg.timestamp as i64 + msg.baro_rel_t;
        let dt = match Self::sensor_dt(&mut self.timestamp_baro, stamp) {
            Ok(dt) => dt,
            Err(status) => return status,
        };

        let predicted_asl = -self.x[xi::POS_D] + self.x[xi::BARO_BIAS] - self.origin.alt();
        let r = Vector1::new(msg.baro_alt - predicted_asl);

        let r_cov = Matrix1::new(10.0 / dt);

        let mut h = SMatrix::<Scalar, Y_BARO, 15>::zeros();
        h[(0, xe::POS_D)] = -1.0;
        h[(0, xe::BARO_BIAS)] = 1.0;

        let Some(corr) = kalman::kalman_correct(&self.p, &h, &r_cov, &r) else {
            return FilterStatus::SingularInnovation;
        };

        let faulted = corr.beta > BETA_TABLE[Y_BARO];
        if faulted {
            warn!("baro fault, beta = {:.1}", corr.beta);
        }

        self.apply_error_correction(&corr.dxe);
        self.set_p(self.p + corr.dp);

        if faulted {
            FilterStatus::FaultDetected(corr.beta)
        } else {
            FilterStatus::Updated
        }
    }

    /// Position/velocity correction from a GNSS fix. The first accepted fix
    /// latches the horizontal and vertical origin.
    fn correct_gps(&mut self, msg: &GpsSample) -> FilterStatus {
        if msg.satellites_used < GPS_MIN_SATELLITES || msg.fix_type < GPS_MIN_FIX_TYPE {
            return FilterStatus::PoorFix;
        }

        self.timestamp_gps = msg.timestamp;
        let lat_deg = msg.lat as Scalar * 1e-7;
        let lon_deg = msg.lon as Scalar * 1e-7;
        let alt_m = msg.alt as Scalar * 1e-3;

        if !self.origin.xy_initialized() {
            info!("gps map ref init {:.6} {:.6}", lat_deg, lon_deg);
            self.origin.xy_initialize(lat_deg, lon_deg, msg.timestamp);
        }

        if !self.origin.alt_initialized() {
            info!("gps alt init {:.2}", alt_m);
            self.origin.alt_initialize(alt_m, msg.timestamp);
        }

        let gps_pos = self.origin.global_to_local(lat_deg, lon_deg, alt_m);

        let mut r = SMatrix::<Scalar, Y_GPS, 1>::zeros();
        r[0] = gps_pos.x - self.x[xi::POS_N];
        r[1] = gps_pos.y - self.x[xi::POS_E];
        r[2] = gps_pos.z - self.x[xi::POS_D];
        r[3] = msg.vel_n - self.x[xi::VEL_N];
        r[4] = msg.vel_e - self.x[xi::VEL_E];
        r[5] = msg.vel_d - self.x[xi::VEL_D];

        let r_cov = SMatrix::<Scalar, Y_GPS, Y_GPS>::identity();

        let mut h = SMatrix::<Scalar, Y_GPS, 15>::zeros();
        h[(0, xe::POS_N)] = 1.0;
        h[(1, xe::POS_E)] = 1.0;
        h[(2, xe::POS_D)] = 1.0;
        h[(3, xe::VEL_N)] = 1.0;
        h[(4, xe::VEL_E)] = 1.0;
        h[(5, xe::VEL_D)] = 1.0;

        let Some(corr) = kalman::kalman_correct(&self.p, &h, &r_cov, &r) else {
            return FilterStatus::SingularInnovation;
        };

        let faulted = corr.beta > BETA_TABLE[Y_GPS];
        if faulted {
            warn!("gps fault, beta = {:.1}", corr.beta);
        }

        // position/velocity aiding is kept out of the attitude
        let mut dxe = corr.dxe;
        dxe[xe::ROT_N] = 0.0;
        dxe[xe::ROT_E] = 0.0;
        dxe[xe::ROT_D] = 0.0;

        self.apply_error_correction(&dxe);
        self.set_p(self.p + corr.dp);

        if faulted {
            FilterStatus::FaultDetected(corr.beta)
        } else {
            FilterStatus::Updated
        }
    }

    // =====================================================================
    // ERROR INJECTION & BOUNDING
    // =====================================================================

    /// Fold an error-state correction into the nominal state.
    ///
    /// Attitude takes a left-multiplicative small-angle increment, the gyro
    /// bias error arrives in nav axes and is rotated into the body frame,
    /// the accelerometer scale is corrected multiplicatively, and the linear
    /// states are additive.
    pub fn apply_error_correction(&mut self, d_xe: &ErrorVector) {
        let q_nb = state::quat_of(&self.x);
        let d_q_nb = Quaternion::from_imag(Vector3::new(
            d_xe[xe::ROT_N],
            d_xe[xe::ROT_E],
            d_xe[xe::ROT_D],
        )) * q_nb;
        let d_gyro_bias_b = state::rotate_to_body(
            q_nb,
            &Vector3::new(
                d_xe[xe::GYRO_BIAS_N],
                d_xe[xe::GYRO_BIAS_E],
                d_xe[xe::GYRO_BIAS_D],
            ),
        );

        let mut dx = StateVector::zeros();
        dx[xi::Q_NB_0] = d_q_nb.w;
        dx[xi::Q_NB_1] = d_q_nb.i;
        dx[xi::Q_NB_2] = d_q_nb.j;
        dx[xi::Q_NB_3] = d_q_nb.k;
        dx[xi::VEL_N] = d_xe[xe::VEL_N];
        dx[xi::VEL_E] = d_xe[xe::VEL_E];
        dx[xi::VEL_D] = d_xe[xe::VEL_D];
        dx.fixed_rows_mut::<3>(xi::GYRO_BIAS_BX)
            .copy_from(&d_gyro_bias_b);
        dx[xi::ACCEL_SCALE] = self.x[xi::ACCEL_SCALE] * d_xe[xe::ACCEL_SCALE];
        dx[xi::POS_N] = d_xe[xe::POS_N];
        dx[xi::POS_E] = d_xe[xe::POS_E];
        dx[xi::POS_D] = d_xe[xe::POS_D];
        dx[xi::TERRAIN_ALT] = d_xe[xe::TERRAIN_ALT];
        dx[xi::BARO_BIAS] = d_xe[xe::BARO_BIAS];

        self.x += dx;
        self.bound_x();
    }

    fn bound_x(&mut self) {
        state::bound_state(&mut self.x, self.config.gyro_bias_limit);
    }

    // =====================================================================
    // OUTPUTS
    // =====================================================================

    /// Assemble the outbound messages from the current estimate, stamped
    /// with the last IMU time.
    pub fn outputs(&self) -> FilterOutputs {
        let timestamp = self.timestamp_imu;
        let q_nb = state::quat_of(&self.x);
        let (_, _, yaw) = UnitQuaternion::from_quaternion(q_nb).euler_angles();

        let eph = (self.p[(xe::POS_N, xe::POS_N)] + self.p[(xe::POS_E, xe::POS_E)]).sqrt();
        let epv = self.p[(xe::POS_D, xe::POS_D)];

        let omega_b = Vector3::new(
            self.u[ui::OMEGA_NB_BX] - self.x[xi::GYRO_BIAS_BX],
            self.u[ui::OMEGA_NB_BY] - self.x[xi::GYRO_BIAS_BY],
            self.u[ui::OMEGA_NB_BZ] - self.x[xi::GYRO_BIAS_BZ],
        );

        let a_b = Vector3::new(
            self.u[ui::ACCEL_BX],
            self.u[ui::ACCEL_BY],
            self.u[ui::ACCEL_BZ],
        );
        let a_spec_b = a_b / self.x[xi::ACCEL_SCALE] - state::rotate_to_body(q_nb, &self.g_n);

        let q_arr = [
            self.x[xi::Q_NB_0],
            self.x[xi::Q_NB_1],
            self.x[xi::Q_NB_2],
            self.x[xi::Q_NB_3],
        ];

        let attitude = Attitude {
            timestamp,
            q: q_arr,
            rollspeed: omega_b.x,
            pitchspeed: omega_b.y,
            yawspeed: omega_b.z,
        };

        let local_position = LocalPosition {
            timestamp,
            xy_valid: true,
            z_valid: true,
            v_xy_valid: true,
            v_z_valid: true,
            x: self.x[xi::POS_N],
            y: self.x[xi::POS_E],
            z: self.x[xi::POS_D],
            vx: self.x[xi::VEL_N],
            vy: self.x[xi::VEL_E],
            vz: self.x[xi::VEL_D],
            yaw,
            xy_global: self.origin.xy_initialized(),
            z_global: self.origin.alt_initialized(),
            ref_timestamp: self.origin.xy_timestamp(),
            ref_lat: self.origin.lat_deg(),
            ref_lon: self.origin.lon_deg(),
            ref_alt: self.origin.alt(),
            dist_bottom: -self.x[xi::POS_D] - self.x[xi::TERRAIN_ALT],
            dist_bottom_rate: -self.x[xi::VEL_D],
            dist_bottom_valid: true,
            eph,
            epv,
        };

        let (lat, lon, alt) = self.origin.local_to_global(
            self.x[xi::POS_N],
            self.x[xi::POS_E],
            self.x[xi::POS_D],
        );
        let global_position = GlobalPosition {
            timestamp,
            lat,
            lon,
            alt,
            vel_n: self.x[xi::VEL_N],
            vel_e: self.x[xi::VEL_E],
            vel_d: self.x[xi::VEL_D],
            yaw,
            eph,
            epv,
            terrain_alt: self.x[xi::TERRAIN_ALT] + self.origin.alt(),
            terrain_alt_valid: true,
            dead_reckoning: false,
        };

        let control_state = ControlState {
            timestamp,
            x_acc: a_spec_b.x,
            y_acc: a_spec_b.y,
            z_acc: a_spec_b.z,
            x_vel: self.x[xi::VEL_N],
            y_vel: self.x[xi::VEL_E],
            z_vel: self.x[xi::VEL_D],
            x_pos: self.x[xi::POS_N],
            y_pos: self.x[xi::POS_E],
            z_pos: self.x[xi::POS_D],
            q: q_arr,
            roll_rate: omega_b.x,
            pitch_rate: omega_b.y,
            yaw_rate: omega_b.z,
            vel_variance: [
                self.p[(xe::VEL_N, xe::VEL_N)],
                self.p[(xe::VEL_E, xe::VEL_E)],
                self.p[(xe::VEL_D, xe::VEL_D)],
            ],
            pos_variance: [
                self.p[(xe::POS_N, xe::POS_N)],
                self.p[(xe::POS_E, xe::POS_E)],
                self.p[(xe::POS_D, xe::POS_D)],
            ],
        };

        let mut states = [0.0; xi::N];
        states.copy_from_slice(self.x.as_slice());
        let mut covariances = [0.0; xe::N];
        for (i, c) in covariances.iter_mut().enumerate() {
            *c = self.p[(i, i)];
        }
        let estimator_status = EstimatorStatus {
            timestamp,
            states,
            n_states: xi::N,
            covariances,
            pos_horiz_accuracy: eph,
            pos_vert_accuracy: epv,
            mag_test_ratio: 0.0,
            vel_test_ratio: 0.0,
            pos_test_ratio: 0.0,
            hgt_test_ratio: 0.0,
        };

        FilterOutputs {
            attitude,
            local_position,
            global_position,
            control_state,
            estimator_status,
        }
    }
}

// ===========================================================================
// TESTS
// ===========================================================================
