//! Geodetic-to-local conversion around a fixed origin.
//!
//! Uses the equirectangular approximation, which stays within centimeters
//! over the few hundred meters an AR session covers.

use serde::{Deserialize, Serialize};

use crate::coords::{GeodeticCoordinate, LocalPose};

/// WGS84 equatorial radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalFrame {
    origin: GeodeticCoordinate,
}

impl LocalFrame {
    pub fn new(origin: GeodeticCoordinate) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> GeodeticCoordinate {
        self.origin
    }

    /// East/up/north offsets of `target` from the origin, in meters.
    ///
    /// A missing altitude on either side is treated as ground level (y = 0).
    pub fn to_local(&self, target: &GeodeticCoordinate) -> LocalPose {
        let lat_origin = self.origin.latitude().to_radians();
        let d_lat = target.latitude().to_radians() - lat_origin;
        let d_lon = wrap_degrees(target.longitude() - self.origin.longitude()).to_radians();

        let east = EARTH_RADIUS_M * d_lon * lat_origin.cos();
        let north = EARTH_RADIUS_M * d_lat;
        let up = match (target.altitude(), self.origin.altitude()) {
            (Some(alt), Some(origin_alt)) => alt - origin_alt,
            _ => 0.0,
        };

        LocalPose::from_position([east, up, north])
    }
}

// Keep longitude deltas in [-180, 180) so frames near the antimeridian work.
fn wrap_degrees(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}
