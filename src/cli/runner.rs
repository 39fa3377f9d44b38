//! CLI execution runner.
//!
//! Drives one session to completion: start, request every target, localize
//! after the configured delay, and stop once every request has settled.
//! Settings commands (`--init-settings`, `--get-setting`, `--set-setting`)
//! run instead of a session.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::points::{save_points, GpsPoint};
use crate::session::{RequestId, SessionEvent, SessionState};

use super::args::Args;
use super::bootstrap::{open_settings, CliContext};
use super::output::{render_event, render_summary, run_event_loop, Flow, OutputMode, RunSummary};

/// Settlement bookkeeping for one run
#[derive(Debug, Default)]
struct Progress {
    requested: usize,
    created: usize,
    failed: usize,
    finished: bool,
}

impl Progress {
    fn settled(&self) -> usize {
        self.created + self.failed
    }

    fn all_settled(&self) -> bool {
        self.settled() >= self.requested
    }
}

/// Run the session described by `ctx` and print its events.
pub async fn execute(ctx: &mut CliContext) -> Result<RunSummary> {
    let mode = OutputMode::from_flags(ctx.args.json, ctx.args.quiet);
    let mut event_rx = ctx
        .event_rx
        .take()
        .ok_or_else(|| anyhow::anyhow!("Session events already consumed"))?;

    ctx.controller
        .start_session()
        .context("Failed to start geo session")?;

    let mut progress = Progress::default();
    let mut labels: HashMap<RequestId, &str> = HashMap::new();
    let mut placed: BTreeMap<RequestId, GpsPoint> = BTreeMap::new();
    for target in &ctx.targets {
        match ctx.controller.add_geo_anchor_at(target.coordinate) {
            Ok(id) => {
                tracing::debug!("[cli] Requested {} for '{}'", id, target.label);
                progress.requested += 1;
                labels.insert(id, target.label.as_str());
            }
            Err(e) => tracing::warn!("[cli] Skipping '{}': {}", target.label, e),
        }
    }

    let localize_after = ctx.localize_after();
    let controller = &ctx.controller;
    let runtime = ctx.runtime.clone();

    let event_loop = run_event_loop(&mut event_rx, mode, |event| {
        match event {
            SessionEvent::SessionStateChanged { current, .. } => match current {
                SessionState::Localizing => {
                    let runtime = runtime.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(localize_after).await;
                        runtime.signal_localized();
                    });
                }
                SessionState::Localized if progress.all_settled() => controller.stop_session(),
                SessionState::Failed(_) | SessionState::Stopped => progress.finished = true,
                _ => {}
            },
            SessionEvent::AnchorCreated { request_id, anchor } => {
                let label = labels.get(request_id).copied().unwrap_or_default();
                placed.insert(
                    *request_id,
                    GpsPoint::from_coordinate(request_id.0.to_string(), label, &anchor.coordinate),
                );
                progress.created += 1;
                if progress.all_settled() && controller.state() == SessionState::Localized {
                    controller.stop_session();
                }
            }
            SessionEvent::AnchorCreationFailed { .. } => {
                progress.failed += 1;
                if progress.all_settled() && controller.state() == SessionState::Localized {
                    controller.stop_session();
                }
            }
            _ => {}
        }

        if progress.finished && progress.all_settled() {
            Flow::Exit
        } else {
            Flow::Continue
        }
    });

    let timeout = Duration::from_secs(ctx.args.timeout_secs);
    let timed_out = match tokio::time::timeout(timeout, event_loop).await {
        Ok(result) => {
            result?;
            false
        }
        Err(_) => true,
    };

    if timed_out {
        tracing::warn!("[cli] Timed out after {:?}, stopping session", timeout);
        ctx.controller.stop_session();
        while let Ok(event) = event_rx.try_recv() {
            render_event(&event, mode)?;
            if let SessionEvent::AnchorCreationFailed { .. } = event {
                progress.failed += 1;
            }
        }
    }

    let summary = RunSummary {
        requested: progress.requested,
        created: progress.created,
        failed: progress.failed,
        final_state: ctx.controller.state(),
    };
    render_summary(&summary, mode)?;

    if let Some(path) = &ctx.args.save_anchors {
        let points: Vec<GpsPoint> = placed.into_values().collect();
        save_points(path, &points)
            .with_context(|| format!("Failed to save anchors to {:?}", path))?;
        tracing::info!("[cli] Saved {} anchors to {:?}", points.len(), path);
    }

    if timed_out {
        anyhow::bail!("Session did not finish within {}s", ctx.args.timeout_secs);
    }
    Ok(summary)
}

/// Run the settings command selected by `args`.
pub async fn execute_settings_command(args: &Args) -> Result<()> {
    let manager = open_settings(args).await?;

    if args.init_settings {
        if manager.ensure_settings_file().await? {
            println!("Created {}", manager.path().display());
        } else {
            println!("{} already exists", manager.path().display());
        }
    }

    if let Some(key) = &args.get_setting {
        let value = manager.get_value(key).await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    if let Some((key, value)) = &args.set_setting {
        manager.set_value(key, value.clone()).await?;
        println!("{} = {}", key, value);
    }

    Ok(())
}
