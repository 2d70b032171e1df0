//! Failures that abort a request. Parse-level anomalies never appear here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Transcription failed: {0}")]
    Transcription(#[source] anyhow::Error),

    #[error("Uploaded file is not a readable image: {0}")]
    InvalidImage(String),

    #[error("Invalid sheet layout: {0}")]
    Layout(String),

    #[error("Could not open template {path:?}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: umya_spreadsheet::XlsxError,
    },

    #[error("Template {0:?} has no worksheet")]
    NoWorksheet(PathBuf),

    #[error("Could not write output {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: umya_spreadsheet::XlsxError,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// True when the failure came from the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidImage(_))
    }

    /// True when the external model, not this service, failed.
    pub fn is_upstream_error(&self) -> bool {
        matches!(self, Self::Transcription(_))
    }
}
