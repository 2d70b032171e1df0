//! Transcription boundary: image in, markdown text out.
//!
//! Defines the [`Transcriber`] trait so the parser and writer never see the
//! network, plus upload normalisation shared by every backend.

pub mod vision;

use crate::error::PipelineError;
use std::io::Cursor;
use tracing::debug;

const JPEG_QUALITY: u8 = 90;

/// An uploaded sheet image, re-encoded as RGB JPEG.
#[derive(Debug, Clone)]
pub struct SheetImage {
    pub filename: String,
    pub data: Vec<u8>,
}

impl SheetImage {
    pub const MIME_TYPE: &'static str = "image/jpeg";

    /// Decode any supported upload (png, jpeg, tiff, ...) and re-encode it as JPEG.
    pub fn from_upload(filename: impl Into<String>, data: &[u8]) -> Result<Self, PipelineError> {
        let filename = filename.into();
        let decoded = image::load_from_memory(data)
            .map_err(|e| PipelineError::InvalidImage(format!("{}: {}", filename, e)))?;

        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, image::ImageOutputFormat::Jpeg(JPEG_QUALITY))
            .map_err(|e| PipelineError::InvalidImage(format!("{}: {}", filename, e)))?;

        let data = out.into_inner();
        debug!(
            "Normalised {} to JPEG ({}x{}, {} bytes)",
            filename,
            rgb.width(),
            rgb.height(),
            data.len()
        );

        Ok(Self { filename, data })
    }
}

/// A backend that reads a sheet image and returns its markdown transcription.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;
    async fn transcribe(&self, image: &SheetImage) -> anyhow::Result<String>;
}
