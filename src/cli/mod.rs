//! CLI module for running geo sessions headless.
//!
//! The CLI drives a `GeoSessionController` against the `SimulatedRuntime`,
//! which lets point files and settings be exercised without a device.
//!
//! ```text
//! +------------------+     +----------------------+     +--------------+
//! | runner.rs        | --> | GeoSessionController | --> | output.rs    |
//! | (start/requests) |     | (SessionEvent tx)    |     | (print/JSON) |
//! +------------------+     +----------------------+     +--------------+
//!                                     ^
//!                                     |
//!              SimulatedRuntime -- signals
//! ```

mod args;
mod bootstrap;
mod output;
mod runner;

pub use args::Args;
pub use bootstrap::{initialize, open_settings, AnchorTarget, CliContext};
pub use output::{run_event_loop, OutputMode, RunSummary};
pub use runner::{execute, execute_settings_command};
