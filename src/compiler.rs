pub mod cli;
pub use cli::Command;

use crate::semantic::SemanticError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error(transparent)]
    InputSourceError(#[from] io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("no input files")]
    NoInput,

    /// `--help` or `--version` was asked for.
    #[error("{0}")]
    Help(String),

    #[error("{}", render_diagnostics(.0))]
    CheckFailed(Vec<SemanticError>),
}

impl From<String> for CompilerError {
    fn from(message: String) -> Self {
        CompilerError::InvalidOption(message)
    }
}

impl From<Vec<SemanticError>> for CompilerError {
    fn from(diagnostics: Vec<SemanticError>) -> Self {
        CompilerError::CheckFailed(diagnostics)
    }
}

/// One diagnostic per line, followed by a summary line.
fn render_diagnostics(diagnostics: &[SemanticError]) -> String {
    let mut rendered = String::new();

    for err in diagnostics {
        rendered.push_str(&err.to_string());
        rendered.push('\n');
    }
    match diagnostics.len() {
        1 => rendered.push_str("1 error"),
        n => rendered.push_str(&format!("{} errors", n)),
    }
    rendered
}
