//! Settings loading, saving, and environment variable interpolation.
//!
//! The `SettingsManager` handles:
//! - Loading settings from `~/.geoanchor/settings.toml`
//! - Resolving `$VAR` and `${VAR}` environment variable references
//! - Atomic file writes with temp file + rename
//! - First-run template generation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use super::schema::GeoAnchorSettings;

/// Embedded template for first-run generation.
const TEMPLATE: &str = include_str!("template.toml");

/// Get the path to the global settings file.
pub fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geoanchor")
        .join("settings.toml")
}

/// Manages settings loading, interpolation, and persistence.
pub struct SettingsManager {
    /// Cached settings (with env vars resolved)
    settings: RwLock<GeoAnchorSettings>,

    /// Path to the settings file
    path: PathBuf,
}

impl SettingsManager {
    /// Create a new SettingsManager, loading from the global path if available.
    pub async fn new() -> Result<Self> {
        Self::with_path(settings_path()).await
    }

    /// Create a SettingsManager backed by an explicit file.
    pub async fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut settings = read_file(&path).await?;
        resolve_env_vars(&mut settings);

        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    /// Get the current settings (read-only).
    pub async fn get(&self) -> GeoAnchorSettings {
        self.settings.read().await.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a specific setting by dot-notation key (e.g., "simulation.availability").
    ///
    /// Values are reported after environment interpolation.
    pub async fn get_value(&self, key: &str) -> Result<serde_json::Value> {
        let json = serde_json::to_value(&*self.settings.read().await)?;
        lookup(&json, key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Setting '{}' not found", key))
    }

    /// Set an existing setting by dot-notation key and persist the file.
    ///
    /// The edit is applied to the file as written, so `$VAR` references in
    /// other keys survive the rewrite.
    pub async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut json = serde_json::to_value(read_file(&self.path).await?)?;
        set_nested_value(&mut json, key, value)?;

        let updated: GeoAnchorSettings = serde_json::from_value(json)
            .with_context(|| format!("Invalid value for setting '{}'", key))?;
        // Unknown keys are dropped by deserialization
        if lookup(&serde_json::to_value(&updated)?, key).is_none() {
            anyhow::bail!("Setting '{}' not found", key);
        }
        self.write_file(&updated).await?;

        let mut resolved = updated;
        resolve_env_vars(&mut resolved);
        *self.settings.write().await = resolved;

        tracing::info!("[settings] {} updated in {:?}", key, self.path);
        Ok(())
    }

    /// Ensure settings file exists, creating from template if needed.
    ///
    /// Returns `true` if a new file was created.
    pub async fn ensure_settings_file(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, TEMPLATE).await?;
        tracing::info!("[settings] Generated template at {:?}", self.path);
        Ok(true)
    }

    // Temp file + rename so readers never see a half-written file
    async fn write_file(&self, settings: &GeoAnchorSettings) -> Result<()> {
        let contents = toml::to_string_pretty(settings).context("Failed to serialize settings")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

/// Settings as written on disk, without env interpolation.
async fn read_file(path: &Path) -> Result<GeoAnchorSettings> {
    if !path.exists() {
        tracing::debug!("[settings] No file at {:?}, using defaults", path);
        return Ok(GeoAnchorSettings::default());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read settings file {:?}", path))?;
    let settings = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse settings file {:?}", path))?;

    tracing::debug!("[settings] Loaded {:?}", path);
    Ok(settings)
}

/// Resolve $ENV_VAR references in string fields.
fn resolve_env_vars(settings: &mut GeoAnchorSettings) {
    if let Some(file) = settings.points.file.as_mut() {
        if let Some(resolved) = resolve_env_ref(file) {
            *file = resolved;
        }
    }
    if let Some(resolved) = resolve_env_ref(&settings.logging.level) {
        settings.logging.level = resolved;
    }
}

/// Write `value` at `key`. Every segment but the last must already exist;
/// the last may be an unset optional field.
fn set_nested_value(
    json: &mut serde_json::Value,
    key: &str,
    value: serde_json::Value,
) -> Result<()> {
    let (parent, last) = match key.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, key),
    };

    let table = parent
        .into_iter()
        .flat_map(|p| p.split('.'))
        .try_fold(json, |node, part| node.get_mut(part))
        .and_then(|node| node.as_object_mut())
        .ok_or_else(|| anyhow::anyhow!("Setting '{}' not found", key))?;
    table.insert(last.to_string(), value);
    Ok(())
}

/// Value at a dot-notation key, if present.
fn lookup<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.').try_fold(json, |node, part| node.get(part))
}

/// Resolve a $ENV_VAR or ${ENV_VAR} reference.
///
/// Returns `Some(resolved)` if the value starts with `$` and the env var exists.
/// Returns `None` if no env var reference or env var not set.
fn resolve_env_ref(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let reference = trimmed.strip_prefix('$')?;
    let var_name = reference
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(reference);

    std::env::var(var_name).ok()
}

/// Get a setting value with environment variable fallback.
///
/// Priority order:
/// 1. Settings value (if set and non-empty)
/// 2. Environment variable (first match from list)
/// 3. Default value
pub fn get_with_env_fallback(
    setting: &Option<String>,
    env_vars: &[&str],
    default: Option<String>,
) -> Option<String> {
    if let Some(v) = setting {
        if !v.is_empty() {
            return Some(v.clone());
        }
    }

    for env_var in env_vars {
        if let Ok(v) = std::env::var(env_var) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }

    default
}
