//! CLI bootstrap - Build a geo session backed by the simulated runtime.
//!
//! `CliContext` owns the controller, the simulated runtime that stands in for
//! a device AR engine, and the list of anchor targets to place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::coords::GeodeticCoordinate;
use crate::frame::LocalFrame;
use crate::points::load_points;
use crate::runtime::SimulatedRuntime;
use crate::session::{GeoSessionController, SessionEvent};
use crate::settings::{get_with_env_fallback, GeoAnchorSettings, SettingsManager};

use super::args::Args;

/// One anchor the CLI will request
#[derive(Debug, Clone)]
pub struct AnchorTarget {
    pub label: String,
    pub coordinate: GeodeticCoordinate,
}

/// Context for CLI execution containing all initialized services.
pub struct CliContext {
    pub controller: GeoSessionController,

    /// Simulated AR engine (also the coaching UI)
    pub runtime: Arc<SimulatedRuntime>,

    /// Session events, taken by the runner
    pub event_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,

    /// Effective settings after CLI overrides
    pub settings: GeoAnchorSettings,

    pub targets: Vec<AnchorTarget>,

    /// Command-line arguments
    pub args: Args,
}

impl CliContext {
    pub fn localize_after(&self) -> Duration {
        Duration::from_millis(self.settings.simulation.localize_after_ms)
    }

    /// Stop the session if it is still running.
    pub fn shutdown(self) -> Result<()> {
        if self.controller.state().is_active() {
            self.controller.stop_session();
        }
        Ok(())
    }
}

/// Open the settings file named by `--settings`, or the global one.
pub async fn open_settings(args: &Args) -> Result<SettingsManager> {
    match &args.settings {
        Some(path) => SettingsManager::with_path(path.clone()).await,
        None => SettingsManager::new().await,
    }
    .context("Failed to initialize settings manager")
}

/// Initialize logging, settings and the session.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    let settings_manager = open_settings(args).await?;

    let mut settings = settings_manager.get().await;

    init_logging(args, &settings.logging.level)?;

    if args.verbose {
        eprintln!("[cli] Settings: {}", settings_manager.path().display());
    }

    apply_overrides(&mut settings, args);

    let points_path = args.points.clone().or_else(|| {
        get_with_env_fallback(&settings.points.file, &["GEOANCHOR_POINTS"], None).map(PathBuf::from)
    });

    let mut targets = Vec::new();
    if let Some(path) = points_path {
        for point in load_points(&path)? {
            let coordinate = point
                .coordinate()
                .with_context(|| format!("Invalid GPS point '{}' in {:?}", point.id, path))?;
            targets.push(AnchorTarget {
                label: point.label().to_string(),
                coordinate,
            });
        }
    }
    targets.extend(args.anchors.iter().map(|coordinate| AnchorTarget {
        label: coordinate.to_string(),
        coordinate: *coordinate,
    }));

    let origin = frame_origin(&settings, &targets)?;
    let runtime = Arc::new(
        SimulatedRuntime::new(LocalFrame::new(origin))
            .with_availability(settings.simulation.availability)
            .with_probe_latency(Duration::from_millis(settings.simulation.probe_latency_ms))
            .with_anchor_latency(Duration::from_millis(settings.simulation.anchor_latency_ms))
            .with_max_range_m(settings.simulation.max_range_m),
    );

    let (controller, event_rx) =
        GeoSessionController::new(runtime.clone(), runtime.clone(), settings.session.clone());

    tracing::debug!(
        "[cli] {} anchor targets, origin {}",
        targets.len(),
        origin
    );

    Ok(CliContext {
        controller,
        runtime,
        event_rx: Some(event_rx),
        settings,
        targets,
        args: args.clone(),
    })
}

// The first target plays the part of the device's first location fix.
fn frame_origin(settings: &GeoAnchorSettings, targets: &[AnchorTarget]) -> Result<GeodeticCoordinate> {
    if settings.simulation.origin_from_first_point {
        match targets.first() {
            Some(first) => return Ok(first.coordinate),
            None => tracing::warn!("[cli] No targets to take the origin from, using settings"),
        }
    }
    settings
        .simulation
        .origin()
        .context("Invalid simulation origin in settings")
}

fn init_logging(args: &Args, configured_level: &str) -> Result<()> {
    let level = if args.verbose { "debug" } else { configured_level };
    let directive = format!("geoanchor_lib={}", level)
        .parse::<tracing_subscriber::filter::Directive>()
        .with_context(|| format!("Invalid log level '{}'", level))?;
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .try_init();
    Ok(())
}

fn apply_overrides(settings: &mut GeoAnchorSettings, args: &Args) {
    if let Some(availability) = args.availability {
        settings.simulation.availability = availability;
    }
    if let Some(delay) = args.localize_after_ms {
        settings.simulation.localize_after_ms = delay;
    }
    if args.no_coaching {
        settings.session.auto_enable_coaching = false;
    }
    if args.origin_from_first_point {
        settings.simulation.origin_from_first_point = true;
    }
    if let Some(max_range) = args.max_range_m {
        settings.simulation.max_range_m = max_range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ArRuntime, GeoAvailability};
    use clap::Parser;

    #[test]
    fn test_overrides_apply_on_top_of_settings() {
        let mut settings = GeoAnchorSettings::default();
        settings.session.auto_enable_coaching = true;

        let args = Args::parse_from([
            "geoanchor-cli",
            "--availability",
            "unsupported",
            "--localize-after-ms",
            "10",
            "--no-coaching",
            "--origin-from-first-point",
            "--max-range-m",
            "0",
        ]);
        apply_overrides(&mut settings, &args);
        assert!(settings.simulation.origin_from_first_point);
        assert_eq!(settings.simulation.max_range_m, 0.0);

        assert_eq!(
            settings.simulation.availability,
            GeoAvailability::Unsupported
        );
        assert_eq!(settings.simulation.localize_after_ms, 10);
        assert!(!settings.session.auto_enable_coaching);
    }

    #[tokio::test]
    async fn test_initialize_collects_targets() {
        let dir = tempfile::tempdir().unwrap();
        let points = dir.path().join("gps_points.json");
        std::fs::write(
            &points,
            r#"{"points": [{"id": "1", "mid": "", "description": "Gate", "Latitude": "41.72", "Longitude": "44.77"}]}"#,
        )
        .unwrap();
        let settings = dir.path().join("settings.toml");

        let args = Args::parse_from([
            "geoanchor-cli",
            points.to_str().unwrap(),
            "-a",
            "41.73,44.78",
            "--settings",
            settings.to_str().unwrap(),
        ]);
        let ctx = initialize(&args).await.unwrap();

        assert_eq!(ctx.targets.len(), 2);
        assert_eq!(ctx.targets[0].label, "Gate");
        assert!(ctx.event_rx.is_some());
        assert_eq!(ctx.localize_after(), Duration::from_millis(1500));
        assert_eq!(ctx.runtime.origin(), GeoAnchorSettings::default().simulation.origin().unwrap());
        ctx.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_origin_from_first_point() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.toml");
        std::fs::write(&settings, "[simulation]\norigin_from_first_point = true\n").unwrap();

        let args = Args::parse_from([
            "geoanchor-cli",
            "-a",
            "-33.8688,151.2093",
            "-a",
            "-33.8690,151.2100",
            "--settings",
            settings.to_str().unwrap(),
        ]);
        let ctx = initialize(&args).await.unwrap();

        let first = ctx.targets[0].coordinate;
        assert_eq!(ctx.runtime.origin(), first);
        let pose = ctx.runtime.to_local_pose(&first).unwrap();
        assert_eq!(pose.position, [0.0, 0.0, 0.0]);
        // Far from the configured Tbilisi origin, yet within range of the first point
        assert!(ctx.runtime.to_local_pose(&ctx.targets[1].coordinate).is_ok());
        ctx.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_configured_origin_limits_range() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from([
            "geoanchor-cli",
            "-a",
            "-33.8688,151.2093",
            "--settings",
            dir.path().join("settings.toml").to_str().unwrap(),
        ]);
        let ctx = initialize(&args).await.unwrap();

        let err = ctx.runtime.to_local_pose(&ctx.targets[0].coordinate).unwrap_err();
        assert!(matches!(err, crate::runtime::RuntimeError::Transform(_)));
        ctx.shutdown().unwrap();
    }
}
