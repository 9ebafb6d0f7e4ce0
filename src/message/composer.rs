//! Outbound message construction.
//!
//! The composer turns user input (typed text, a selected image, a finished
//! voice recording) into an outbound request of a tagged kind. Media is
//! pushed through the injected [`MediaUploader`] for a durable URL before
//! any message record exists, so a failed upload leaves nothing to roll
//! back.

use std::sync::Arc;

use crate::shared::ComposeError;
use crate::store::{MediaKind, MediaPayload, MediaUploader};
use crate::util;
use crate::voice::Recording;

use super::types::{AttachmentFile, MessageKind};

/// An outbound request: what to append to the store, minus the conversation
/// context the session supplies.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundContent {
    pub kind: MessageKind,
    pub content: String,
}

pub struct MessageComposer {
    uploader: Arc<dyn MediaUploader>,
}

impl MessageComposer {
    pub fn new(uploader: Arc<dyn MediaUploader>) -> Self {
        Self { uploader }
    }

    /// Compose a text message. Whitespace-only input is not a message;
    /// returns `None` and nothing is sent.
    pub fn compose_text(&self, body: &str) -> Option<OutboundContent> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(OutboundContent {
            kind: MessageKind::Text,
            content: trimmed.to_string(),
        })
    }

    /// Compose an image message.
    ///
    /// The file is converted to a transportable data URL entirely
    /// client-side, then handed to the uploader for the durable-storage
    /// round trip.
    pub async fn compose_image(&self, image: AttachmentFile) -> Result<OutboundContent, ComposeError> {
        let mime = util::mime_from_extension(&image.extension);
        let data_url = util::to_data_url(&mime, &image.bytes);

        let url = self
            .uploader
            .upload(MediaPayload::DataUrl(data_url), MediaKind::Image)
            .await?;

        Ok(OutboundContent {
            kind: MessageKind::Image,
            content: url,
        })
    }

    /// Compose a voice message from a finalized recording.
    pub async fn compose_audio(&self, recording: Recording) -> Result<OutboundContent, ComposeError> {
        let url = self
            .uploader
            .upload(
                MediaPayload::Bytes {
                    bytes: Arc::new(recording.wav),
                    extension: "wav".to_string(),
                },
                MediaKind::Audio,
            )
            .await?;

        Ok(OutboundContent {
            kind: MessageKind::Audio,
            content: url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::UploadError;
    use crate::store::MemoryUploader;
    use async_trait::async_trait;

    fn composer() -> (MessageComposer, Arc<MemoryUploader>) {
        let uploader = Arc::new(MemoryUploader::new());
        (MessageComposer::new(uploader.clone()), uploader)
    }

    #[test]
    fn test_text_is_trimmed() {
        let (composer, _) = composer();
        let out = composer.compose_text("  hello there \n").unwrap();
        assert_eq!(out.kind, MessageKind::Text);
        assert_eq!(out.content, "hello there");
    }

    #[test]
    fn test_whitespace_only_text_is_no_message() {
        let (composer, _) = composer();
        assert!(composer.compose_text("   ").is_none());
        assert!(composer.compose_text("").is_none());
        assert!(composer.compose_text("\n\t ").is_none());
    }

    #[tokio::test]
    async fn test_image_uploads_data_url() {
        let (composer, uploader) = composer();
        let out = composer
            .compose_image(AttachmentFile::new(vec![1, 2, 3, 4], "png"))
            .await
            .unwrap();

        assert_eq!(out.kind, MessageKind::Image);
        assert!(out.content.ends_with(".png"));
        assert_eq!(uploader.upload_count().await, 1);
    }

    #[tokio::test]
    async fn test_audio_uploads_wav_payload() {
        let (composer, uploader) = composer();
        let recording = Recording {
            wav: vec![0u8; 400],
            duration_secs: 2.0,
            sample_rate: 16_000,
        };

        let out = composer.compose_audio(recording).await.unwrap();
        assert_eq!(out.kind, MessageKind::Audio);
        assert!(out.content.ends_with(".wav"));
        assert_eq!(uploader.upload_count().await, 1);
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces_and_creates_nothing() {
        struct FailingUploader;

        #[async_trait]
        impl MediaUploader for FailingUploader {
            async fn upload(
                &self,
                _payload: MediaPayload,
                _kind: MediaKind,
            ) -> Result<String, UploadError> {
                Err(UploadError::Transport("connection reset".to_string()))
            }
        }

        let composer = MessageComposer::new(Arc::new(FailingUploader));
        let err = composer
            .compose_image(AttachmentFile::new(vec![1], "png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::UploadFailed(_)));
    }
}
