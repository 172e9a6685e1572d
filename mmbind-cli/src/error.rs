//! Error handling for the mmbind CLI

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Can't read {}: {message}", path.display())]
    Input { path: PathBuf, message: String },

    #[error("No sequences in {}", path.display())]
    EmptyInput { path: PathBuf },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn input<S: Into<String>>(path: PathBuf, message: S) -> Self {
        Self::Input { path, message: message.into() }
    }
}
