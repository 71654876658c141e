//! Error types

use std::fmt;

use serde::Serialize;

/// A source position inside a definition file.
///
/// Diagnostics carry this by value so they stay independent of the token
/// arenas they were raised from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new<S: Into<String>>(path: S, line: usize, column: usize) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // environment
    #[error("The required environment variable `{0}` has not been set.")]
    MissingEnv(String),
    #[error("Failed to set environment variable `{0}`.")]
    SetEnv(String),
    #[error("{0}")]
    MalformedEnvRef(String),

    // fs
    #[error("Cannot find `{0}`")]
    NotFound(String),
    #[error("Invalid path `{0}`: {1}")]
    InvalidPath(String, std::io::Error),
    #[error("Cannot read file `{0}`: {1}")]
    ReadFile(String, std::io::Error),
    #[error("Cannot write file `{0}`: {1}")]
    WriteFile(String, std::io::Error),
    #[error("Cannot rename file `{0}` to `{1}`: {2}")]
    RenameFile(String, String, std::io::Error),
    #[error("Cannot remove file `{0}`: {1}")]
    RemoveFile(String, std::io::Error),
    #[error("Cannot create directory `{0}`: {1}")]
    CreateDirectory(String, std::io::Error),

    // lexing
    #[error("{0}: error: {1}")]
    Lex(Location, String),

    // parsing
    #[error("{0}: error: {1}")]
    Parse(Location, String),

    // modelling
    #[error("{0}: error: {1}")]
    Model(Location, String),
    #[error("error: {0}")]
    Validate(String),

    // definition-file editing
    #[error("{0}")]
    Edit(String),

    #[error("parsing regex: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    pub fn print(&self) {
        crate::system::errorln!("Fatal", "{}", self);
    }
}
