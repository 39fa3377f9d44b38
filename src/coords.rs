//! Coordinate value types.
//!
//! `GeodeticCoordinate` is validated on construction and immutable afterwards;
//! `LocalPose` is whatever transform the AR runtime hands back for an anchor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GeoSessionError, Result};

/// Latitude/longitude in degrees (WGS84), altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct GeodeticCoordinate {
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    altitude: Option<f64>,
}

impl GeodeticCoordinate {
    pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
    pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

    /// Build a coordinate without altitude.
    ///
    /// # Errors
    /// Returns `GeoSessionError::InvalidCoordinate` when latitude is outside
    /// [-90, 90], longitude is outside [-180, 180], or either is not finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        Self::with_altitude(latitude, longitude, None)
    }

    pub fn with_altitude(latitude: f64, longitude: f64, altitude: Option<f64>) -> Result<Self> {
        let (lat_min, lat_max) = Self::LATITUDE_RANGE;
        let (lon_min, lon_max) = Self::LONGITUDE_RANGE;

        if !latitude.is_finite() || !(lat_min..=lat_max).contains(&latitude) {
            return Err(GeoSessionError::InvalidCoordinate(format!(
                "latitude {} outside [{}, {}]",
                latitude, lat_min, lat_max
            )));
        }
        if !longitude.is_finite() || !(lon_min..=lon_max).contains(&longitude) {
            return Err(GeoSessionError::InvalidCoordinate(format!(
                "longitude {} outside [{}, {}]",
                longitude, lon_min, lon_max
            )));
        }
        if let Some(alt) = altitude {
            if !alt.is_finite() {
                return Err(GeoSessionError::InvalidCoordinate(format!(
                    "altitude {} is not finite",
                    alt
                )));
            }
        }

        Ok(Self {
            latitude,
            longitude,
            altitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }
}

impl fmt::Display for GeodeticCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)?;
        if let Some(alt) = self.altitude {
            write!(f, " @ {:.1}m", alt)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    altitude: Option<f64>,
}

impl TryFrom<RawCoordinate> for GeodeticCoordinate {
    type Error = GeoSessionError;

    fn try_from(raw: RawCoordinate) -> Result<Self> {
        Self::with_altitude(raw.latitude, raw.longitude, raw.altitude)
    }
}

/// Anchor transform in the AR session's local frame.
///
/// Axes are (x, y, z) = (east, up, north) in meters; `orientation` is a
/// unit quaternion (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalPose {
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

impl LocalPose {
    pub const IDENTITY_ORIENTATION: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

    pub fn from_position(position: [f64; 3]) -> Self {
        Self {
            position,
            orientation: Self::IDENTITY_ORIENTATION,
        }
    }
}
