//! TOML-based settings for geoanchor.
//!
//! Settings are loaded from `~/.geoanchor/settings.toml` with environment
//! variable interpolation support.
//!
//! # Usage
//!
//! ```rust,ignore
//! use geoanchor_lib::settings::{SettingsManager, get_with_env_fallback};
//!
//! let manager = SettingsManager::new().await?;
//! let settings = manager.get().await;
//!
//! let points = get_with_env_fallback(
//!     &settings.points.file,
//!     &["GEOANCHOR_POINTS"],
//!     None,
//! );
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_with_env_fallback, settings_path, SettingsManager};
pub use schema::{GeoAnchorSettings, LoggingSettings, PointsSettings, SimulationSettings};
