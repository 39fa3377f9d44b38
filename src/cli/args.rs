//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for geoanchor-cli.

use std::path::PathBuf;

use clap::Parser;

use crate::coords::GeodeticCoordinate;
use crate::runtime::GeoAvailability;

/// geoanchor CLI - place geo-anchors against a simulated AR runtime
#[derive(Parser, Debug, Clone)]
#[command(name = "geoanchor-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// GPS point file (JSON array or {"points": [...]})
    ///
    /// Defaults to `points.file` from settings, then $GEOANCHOR_POINTS.
    pub points: Option<PathBuf>,

    /// Extra anchor as "LAT,LON" (repeatable)
    #[arg(short = 'a', long = "anchor", value_parser = parse_anchor)]
    pub anchors: Vec<GeodeticCoordinate>,

    /// Settings file (default: ~/.geoanchor/settings.toml)
    #[arg(long, env = "GEOANCHOR_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Override the simulated probe verdict
    ///
    /// Options: available, unsupported, unauthorized
    #[arg(long, value_parser = parse_availability)]
    pub availability: Option<GeoAvailability>,

    /// Override the simulated localization delay in milliseconds
    #[arg(long)]
    pub localize_after_ms: Option<u64>,

    /// Do not show the coaching overlay on start
    #[arg(long)]
    pub no_coaching: bool,

    /// Anchor the local frame at the first target instead of the configured origin
    #[arg(long)]
    pub origin_from_first_point: bool,

    /// Override the farthest distance (meters) a target may be from the origin
    #[arg(long)]
    pub max_range_m: Option<f64>,

    /// Write every created anchor to this GPS point file after the run
    #[arg(long, value_name = "PATH")]
    pub save_anchors: Option<PathBuf>,

    /// Write the documented settings template if no settings file exists
    #[arg(long, group = "settings_cmd")]
    pub init_settings: bool,

    /// Print one setting by dotted key (e.g. simulation.availability) and exit
    #[arg(long, value_name = "KEY", group = "settings_cmd")]
    pub get_setting: Option<String>,

    /// Persist KEY=VALUE to the settings file and exit (VALUE is JSON or a bare string)
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_setting, group = "settings_cmd")]
    pub set_setting: Option<(String, serde_json::Value)>,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Output events as JSON lines (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Only output the final summary
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn parse_anchor(value: &str) -> Result<GeodeticCoordinate, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", value))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
    GeodeticCoordinate::new(lat, lon).map_err(|e| e.to_string())
}

impl Args {
    /// True when the invocation edits settings instead of running a session
    pub fn is_settings_command(&self) -> bool {
        self.init_settings || self.get_setting.is_some() || self.set_setting.is_some()
    }
}

fn parse_setting(value: &str) -> Result<(String, serde_json::Value), String> {
    let (key, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", value))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("setting key is empty".to_string());
    }
    let raw = raw.trim();
    let parsed = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((key.to_string(), parsed))
}

fn parse_availability(value: &str) -> Result<GeoAvailability, String> {
    match value.to_ascii_lowercase().as_str() {
        "available" => Ok(GeoAvailability::Available),
        "unsupported" => Ok(GeoAvailability::Unsupported),
        "unauthorized" => Ok(GeoAvailability::Unauthorized),
        other => Err(format!(
            "unknown availability '{}' (expected available, unsupported or unauthorized)",
            other
        )),
    }
}
