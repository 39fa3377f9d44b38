//! CLI output handling - Session event receiver loop.
//!
//! Receives events from the geo session and renders them based on output
//! mode (terminal, JSON, or quiet).

use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::session::{AnchorFailure, SessionEvent, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Terminal,
    Json,
    Quiet,
}

impl OutputMode {
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Terminal
        }
    }
}

/// Whether the event loop should keep receiving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Final tally printed when the run ends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub requested: usize,
    pub created: usize,
    pub failed: usize,
    pub final_state: SessionState,
}

/// Run the event loop, rendering each event until `on_event` asks to exit
/// or the channel closes.
pub async fn run_event_loop<F>(
    event_rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    mode: OutputMode,
    mut on_event: F,
) -> Result<()>
where
    F: FnMut(&SessionEvent) -> Flow,
{
    while let Some(event) = event_rx.recv().await {
        render_event(&event, mode)?;
        if on_event(&event) == Flow::Exit {
            break;
        }
    }
    Ok(())
}

pub fn render_event(event: &SessionEvent, mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Json => {
            println!("{}", serde_json::to_string(event)?);
            io::stdout().flush()?;
        }
        OutputMode::Terminal => {
            println!("{}", format_event(event));
        }
        OutputMode::Quiet => {}
    }
    Ok(())
}

pub fn render_summary(summary: &RunSummary, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        let json = serde_json::json!({
            "type": "summary",
            "summary": summary,
        });
        println!("{}", json);
    } else {
        println!(
            "{}/{} anchors created, {} failed (session {})",
            summary.created, summary.requested, summary.failed, summary.final_state
        );
    }
    io::stdout().flush()?;
    Ok(())
}

/// One-line terminal rendering of a session event.
fn format_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::SessionStateChanged {
            previous, current, ..
        } => format!("[session] {} -> {}", previous, current),
        SessionEvent::AnchorQueued {
            request_id,
            coordinate,
        } => format!("[queued] {} {}", request_id, coordinate),
        SessionEvent::AnchorCreated { request_id, anchor } => {
            let [x, y, z] = anchor.local_pose.position;
            format!(
                "[anchor] {} {} -> east {:.2}m, up {:.2}m, north {:.2}m",
                request_id, anchor.coordinate, x, y, z
            )
        }
        SessionEvent::AnchorCreationFailed { request_id, reason } => match reason {
            AnchorFailure::TransformFailed { message } | AnchorFailure::Rejected { message } => {
                format!("[failed] {} {}: {}", request_id, reason.name(), message)
            }
            _ => format!("[failed] {} {}", request_id, reason.name()),
        },
        SessionEvent::OverlayFailed { message } => format!("[overlay] {}", message),
    }
}
