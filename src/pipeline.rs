//! One request end to end: transcribe → parse → write → save.

use crate::error::PipelineError;
use crate::markdown_parser::parse_markdown_with_stats;
use crate::observation::{ExtractionResult, ParseStats};
use crate::ocr::{SheetImage, Transcriber};
use crate::sheet_writer::{SheetWriter, WriteReport};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub id: String,
    pub source_file: String,
    pub transcriber: String,
    /// SHA-256 of the transcription text.
    pub content_hash: String,
    pub markdown: String,
    pub result: ExtractionResult,
    pub stats: ParseStats,
    pub written: WriteReport,
    pub output_path: PathBuf,
}

pub struct ExtractionPipeline {
    transcriber: Arc<dyn Transcriber>,
    writer: SheetWriter,
    template_path: PathBuf,
    output_dir: PathBuf,
}

impl ExtractionPipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        writer: SheetWriter,
        template_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transcriber,
            writer,
            template_path: template_path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Run the full pipeline for one uploaded image.
    ///
    /// The model call is a single attempt. Any boundary failure aborts the
    /// run before an output file exists.
    pub async fn run(&self, image: &SheetImage) -> Result<ExtractionReport, PipelineError> {
        let id = format!("mtc_{}", Uuid::new_v4().simple());
        info!(
            "[{}] Transcribing {} with {}",
            id,
            image.filename,
            self.transcriber.name()
        );

        let markdown = self.transcriber.transcribe(image).await.map_err(|e| {
            error!("[{}] Transcription failed: {:#}", id, e);
            PipelineError::Transcription(e)
        })?;

        self.write_markdown(id, &image.filename, markdown)
    }

    /// Parse an already transcribed document and write it to a fresh output file.
    pub fn write_markdown(
        &self,
        id: String,
        source_file: &str,
        markdown: String,
    ) -> Result<ExtractionReport, PipelineError> {
        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(markdown.as_bytes());
            format!("{:x}", hasher.finalize())
        };

        let (result, stats) = parse_markdown_with_stats(&markdown);
        info!(
            "[{}] Parsed {} samples ({} sections, {} rows dropped)",
            id,
            result.samples.len(),
            stats.sections_found,
            stats.rows_dropped
        );

        std::fs::create_dir_all(&self.output_dir).map_err(|e| PipelineError::Io {
            path: self.output_dir.clone(),
            source: e,
        })?;
        let output_path = self.output_dir.join(format!("Populated_MTC_{}.xlsx", id));

        let written = self
            .writer
            .populate(&result, &self.template_path, &output_path)?;

        Ok(ExtractionReport {
            id,
            source_file: source_file.to_string(),
            transcriber: self.transcriber.name().to_string(),
            content_hash,
            markdown,
            result,
            stats,
            written,
            output_path,
        })
    }
}

/// Read a finished workbook into memory and remove it from the output directory.
///
/// A failed removal is logged, not returned; the caller already has the bytes.
pub async fn take_output(report: &ExtractionReport) -> Result<Vec<u8>, PipelineError> {
    let bytes = tokio::fs::read(&report.output_path)
        .await
        .map_err(|e| PipelineError::Io {
            path: report.output_path.clone(),
            source: e,
        })?;

    if let Err(e) = tokio::fs::remove_file(&report.output_path).await {
        warn!(
            "[{}] Could not remove {:?}: {}",
            report.id, report.output_path, e
        );
    }

    Ok(bytes)
}
