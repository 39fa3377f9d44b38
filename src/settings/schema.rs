//! Settings schema definitions for geoanchor configuration.
//!
//! All settings structs use `#[serde(default)]` to allow partial configuration files.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};

use crate::coords::GeodeticCoordinate;
use crate::error::Result;
use crate::runtime::GeoAvailability;
use crate::session::SessionConfig;

/// Root settings structure.
///
/// Loaded from `~/.geoanchor/settings.toml` with environment variable interpolation support.
/// Version field enables future migrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoAnchorSettings {
    /// Schema version for migrations
    pub version: u32,

    /// Session controller behavior
    pub session: SessionConfig,

    /// Simulated runtime used by the CLI
    pub simulation: SimulationSettings,

    /// GPS point source
    pub points: PointsSettings,

    pub logging: LoggingSettings,
}

/// Scripted behavior of the simulated AR runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Probe verdict: "available" | "unsupported" | "unauthorized"
    pub availability: GeoAvailability,

    pub probe_latency_ms: u64,

    pub anchor_latency_ms: u64,

    /// Delay between entering Localizing and the simulated localization
    pub localize_after_ms: u64,

    /// Origin of the local frame
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_altitude: Option<f64>,

    /// Take the origin from the first GPS point instead, the way a device
    /// anchors its frame at the first location fix
    pub origin_from_first_point: bool,

    /// Farthest a target may be from the origin, in meters (0 = unlimited)
    pub max_range_m: f64,
}

/// Where GPS points come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PointsSettings {
    /// Path to a GPS point JSON file (supports $ENV_VAR)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level for the geoanchor crate: "error" | "warn" | "info" | "debug" | "trace"
    pub level: String,
}

// =============================================================================
// Default implementations
// =============================================================================

impl Default for GeoAnchorSettings {
    fn default() -> Self {
        Self {
            version: 1,
            session: SessionConfig::default(),
            simulation: SimulationSettings::default(),
            points: PointsSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            availability: GeoAvailability::Available,
            probe_latency_ms: 200,
            anchor_latency_ms: 50,
            localize_after_ms: 1500,
            // Tbilisi, where the sample survey points were taken
            origin_latitude: 41.7205,
            origin_longitude: 44.7742,
            origin_altitude: None,
            origin_from_first_point: false,
            max_range_m: 50_000.0,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SimulationSettings {
    /// Validated frame origin
    pub fn origin(&self) -> Result<GeodeticCoordinate> {
        GeodeticCoordinate::with_altitude(
            self.origin_latitude,
            self.origin_longitude,
            self.origin_altitude,
        )
    }
}
