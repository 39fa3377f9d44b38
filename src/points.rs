//! GPS point files.
//!
//! A point file is a JSON list of survey points whose latitude and longitude
//! are stored as decimal strings:
//!
//! ```json
//! [
//!   { "id": "1", "mid": "m-7", "description": "North gate",
//!     "Latitude": "41.72055696104794", "Longitude": "44.77427386297237" }
//! ]
//! ```
//!
//! The list may also be wrapped as `{ "points": [...] }`, which is also the
//! shape `save_points` writes. An optional `"Altitude"` string carries
//! meters above the reference ellipsoid.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coords::GeodeticCoordinate;
use crate::error::GeoSessionError;

/// One surveyed point as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    pub longitude: String,
    #[serde(rename = "Altitude", default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointFile {
    List(Vec<GpsPoint>),
    Wrapped { points: Vec<GpsPoint> },
}

#[derive(Serialize)]
struct SavedPoints<'a> {
    points: &'a [GpsPoint],
}

impl GpsPoint {
    /// Point for a placed coordinate. Numbers are written in their shortest
    /// exact decimal form, so loading the point gives back the same value.
    pub fn from_coordinate(
        id: impl Into<String>,
        description: impl Into<String>,
        coordinate: &GeodeticCoordinate,
    ) -> Self {
        Self {
            id: id.into(),
            mid: String::new(),
            description: description.into(),
            latitude: coordinate.latitude().to_string(),
            longitude: coordinate.longitude().to_string(),
            altitude: coordinate.altitude().map(|alt| alt.to_string()),
        }
    }

    /// Parse and validate the stored coordinate.
    pub fn coordinate(&self) -> std::result::Result<GeodeticCoordinate, GeoSessionError> {
        let latitude = parse_number(&self.latitude, "latitude", &self.id)?;
        let longitude = parse_number(&self.longitude, "longitude", &self.id)?;
        let altitude = self
            .altitude
            .as_deref()
            .map(|alt| parse_number(alt, "altitude", &self.id))
            .transpose()?;
        GeodeticCoordinate::with_altitude(latitude, longitude, altitude)
    }

    /// Label used in CLI output: description, falling back to the id
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.id
        } else {
            &self.description
        }
    }
}

fn parse_number(
    value: &str,
    field: &str,
    id: &str,
) -> std::result::Result<f64, GeoSessionError> {
    value.trim().parse::<f64>().map_err(|_| {
        GeoSessionError::InvalidCoordinate(format!(
            "point '{}' has non-numeric {} '{}'",
            id, field, value
        ))
    })
}

/// Parse a point list from JSON text.
pub fn parse_points(json: &str) -> Result<Vec<GpsPoint>> {
    let file: PointFile = serde_json::from_str(json).context("Failed to parse GPS point list")?;
    Ok(match file {
        PointFile::List(points) | PointFile::Wrapped { points } => points,
    })
}

/// Load a point file from disk.
pub fn load_points(path: &Path) -> Result<Vec<GpsPoint>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read GPS points from {:?}", path))?;
    let points = parse_points(&contents)?;
    tracing::info!("Loaded {} GPS points from {:?}", points.len(), path);
    Ok(points)
}

/// Write `points` as `{"points": [...]}`, replacing any existing file.
pub fn save_points(path: &Path, points: &[GpsPoint]) -> Result<()> {
    let json = serde_json::to_string_pretty(&SavedPoints { points })
        .context("Failed to serialize GPS points")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, json)
        .with_context(|| format!("Failed to write GPS points to {:?}", temp_path))?;
    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move GPS points into {:?}", path))?;

    tracing::info!("Saved {} GPS points to {:?}", points.len(), path);
    Ok(())
}
