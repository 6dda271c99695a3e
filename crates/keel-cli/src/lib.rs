//! CLI logic for the Keel session replay tool.
//!
//! Loads a session script, replays it against a [`DiagramState`] backed by the
//! in-process [`LayeredService`] and writes the resulting positions.

pub mod session;

mod args;
mod config;
mod error;

pub use args::Args;
pub use config::{ConfigError, load_config};
pub use error::CliError;

use std::fs;

use log::info;

use keel::{DiagramState, layout::LayeredService};

use session::{Session, SessionOutput};

/// Run the Keel CLI application
///
/// Replays the session in the input file and writes the final node
/// positions, their provenance and the history counters to the output file.
///
/// # Errors
///
/// Returns `CliError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed session files
/// - Steps rejected by the engine
pub fn run(args: &Args) -> Result<(), CliError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Replaying session"
    );

    let app_config = load_config(args.config.as_ref())?;

    let content = fs::read_to_string(&args.input)?;
    let session = Session::parse(&args.input, &content)?;

    let service = LayeredService::new().with_margin(app_config.layout().group_padding());
    let mut state = DiagramState::from_config(service, &app_config)?;
    session.replay(&mut state)?;

    let output = SessionOutput::from_state(&state);
    fs::write(&args.output, output.to_toml()?)?;

    info!(
        output_file = args.output,
        nodes = output.nodes.len();
        "Positions written"
    );

    Ok(())
}
