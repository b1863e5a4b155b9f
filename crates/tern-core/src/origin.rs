//! Lazily latched navigation origin.
//!
//! The horizontal and vertical references latch independently on the first
//! valid GPS fix and never move afterwards. Conversion between geodetic and
//! local NED coordinates uses a spherical-earth tangent plane, which is
//! plenty for the few-kilometer excursions of a small vehicle.

use crate::state::Scalar;
use nalgebra::Vector3;

const EARTH_RADIUS: Scalar = 6_371_000.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct NavOrigin {
    lat0_rad: Scalar,
    lon0_rad: Scalar,
    alt0: Scalar,
    xy_timestamp: u64,
    alt_timestamp: u64,
    xy_init: bool,
    alt_init: bool,
}

impl NavOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn xy_initialized(&self) -> bool {
        self.xy_init
    }

    pub fn alt_initialized(&self) -> bool {
        self.alt_init
    }

    /// Latch the horizontal reference. Later calls are ignored.
    pub fn xy_initialize(&mut self, lat_deg: Scalar, lon_deg: Scalar, timestamp: u64) {
        if self.xy_init {
            return;
        }
        self.lat0_rad = lat_deg.to_radians();
        self.lon0_rad = lon_deg.to_radians();
        self.xy_timestamp = timestamp;
        self.xy_init = true;
    }

    /// Latch the vertical reference. Later calls are ignored.
    pub fn alt_initialize(&mut self, alt_m: Scalar, timestamp: u64) {
        if self.alt_init {
            return;
        }
        self.alt0 = alt_m;
        self.alt_timestamp = timestamp;
        self.alt_init = true;
    }

    /// Geodetic coordinates to local NED, valid once the origin has latched.
    pub fn global_to_local(&self, lat_deg: Scalar, lon_deg: Scalar, alt_m: Scalar) -> Vector3<Scalar> {
        let d_lat = lat_deg.to_radians() - self.lat0_rad;
        let d_lon = lon_deg.to_radians() - self.lon0_rad;
        let n = d_lat * EARTH_RADIUS;
        let e = d_lon * EARTH_RADIUS * self.lat0_rad.cos();
        let d = self.alt0 - alt_m;
        Vector3::new(n, e, d)
    }

    /// Local NED back to geodetic coordinates.
    pub fn local_to_global(&self, n: Scalar, e: Scalar, d: Scalar) -> (Scalar, Scalar, Scalar) {
        let lat = self.lat0_rad + n / EARTH_RADIUS;
        let lon = self.lon0_rad + e / (EARTH_RADIUS * self.lat0_rad.cos());
        let alt = self.alt0 - d;
        (lat.to_degrees(), lon.to_degrees(), alt)
    }

    pub fn lat_deg(&self) -> Scalar {
        self.lat0_rad.to_degrees()
    }

    pub fn lon_deg(&self) -> Scalar {
        self.lon0_rad.to_degrees()
    }

    /// Reference altitude; 0 until the vertical origin latches.
    pub fn alt(&self) -> Scalar {
        self.alt0
    }

    pub fn xy_timestamp(&self) -> u64 {
        self.xy_timestamp
    }

    pub fn alt_timestamp(&self) -> u64 {
        self.alt_timestamp
    }
}

// ===========================================================================
// TESTS
// ===========================================================================
