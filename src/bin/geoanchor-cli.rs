//! geoanchor CLI - run a geo-anchor session against the simulated runtime
//!
//! # Usage
//!
//! ```bash
//! # Build the CLI binary
//! cargo build --features cli --bin geoanchor-cli
//!
//! # Place every point from a GPS point file
//! ./target/debug/geoanchor-cli gps_points.json
//!
//! # Ad-hoc anchors, JSON output for scripting
//! ./target/debug/geoanchor-cli -a 41.7206,44.7743 -a 41.7210,44.7750 --json | jq .
//!
//! # See how a device without permission behaves
//! ./target/debug/geoanchor-cli gps_points.json --availability unauthorized
//!
//! # Keep what was placed, framed around the first point
//! ./target/debug/geoanchor-cli gps_points.json --origin-from-first-point --save-anchors placed.json
//!
//! # Settings maintenance
//! ./target/debug/geoanchor-cli --init-settings
//! ./target/debug/geoanchor-cli --set-setting simulation.localize_after_ms=500
//! ```

use anyhow::Result;
use clap::Parser;

use geoanchor_lib::cli::{execute, execute_settings_command, initialize, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.is_settings_command() {
        return execute_settings_command(&args).await;
    }

    let mut ctx = initialize(&args).await?;

    let result = execute(&mut ctx).await;

    ctx.shutdown()?;

    result.map(|_| ())
}
