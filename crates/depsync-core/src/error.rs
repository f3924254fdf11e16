use thiserror::Error;

/// Errors raised while setting up a command, before any sync operation runs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Installer binary not found: {name}")]
    ToolNotFound { name: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
