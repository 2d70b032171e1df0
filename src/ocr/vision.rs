//! Vision-model transcriber (multimodal chat completion through OpenRouter).

use super::{SheetImage, Transcriber};
use crate::openrouter::{Message, OpenRouterClient};
use tracing::{debug, info};

pub struct VisionTranscriber {
    client: OpenRouterClient,
    prompt: String,
}

impl VisionTranscriber {
    pub fn new(client: OpenRouterClient, prompt: impl Into<String>) -> Self {
        Self {
            client,
            prompt: prompt.into(),
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for VisionTranscriber {
    fn name(&self) -> &str {
        self.client.model()
    }

    async fn transcribe(&self, image: &SheetImage) -> anyhow::Result<String> {
        info!(
            "VisionTranscriber: sending {} ({} bytes) to {}",
            image.filename,
            image.data.len(),
            self.client.model()
        );

        let messages = vec![Message::user_with_image(
            self.prompt.as_str(),
            &image.data,
            SheetImage::MIME_TYPE,
        )];

        let text = self.client.chat(messages).await?;
        if text.trim().is_empty() {
            anyhow::bail!("Model returned an empty transcription for {}", image.filename);
        }

        debug!(
            "VisionTranscriber: {} chars, starts: {}",
            text.len(),
            text.chars().take(200).collect::<String>()
        );

        Ok(text)
    }
}
