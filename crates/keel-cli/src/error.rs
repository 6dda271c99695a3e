//! Error type of the Keel CLI with miette diagnostics.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use keel::KeelError;

use crate::config::ConfigError;

/// Any failure of a CLI run.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(keel::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(keel::config), help("Check the configuration file against the documented sections"))]
    Config(#[from] ConfigError),

    #[error("Invalid session file: {message}")]
    #[diagnostic(
        code(keel::session::parse),
        help("A session is a list of [[step]] tables with an `action` key")
    )]
    Session {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: Option<SourceSpan>,
    },

    #[error("Step {step} ({action}) failed")]
    #[diagnostic(code(keel::session::step))]
    Step {
        step: usize,
        action: &'static str,
        #[source]
        source: KeelError,
    },

    #[error(transparent)]
    #[diagnostic(code(keel::engine))]
    Keel(#[from] KeelError),

    #[error("Failed to write positions: {0}")]
    #[diagnostic(code(keel::output))]
    Output(String),
}

impl CliError {
    /// Creates a session parse error pointing into `source`.
    pub fn session(
        name: &str,
        source: &str,
        message: impl Into<String>,
        span: Option<std::ops::Range<usize>>,
    ) -> Self {
        Self::Session {
            message: message.into(),
            src: NamedSource::new(name, source.to_string()),
            span: span.map(SourceSpan::from),
        }
    }
}
