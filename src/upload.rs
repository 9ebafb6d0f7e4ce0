//! HTTP media uploader.
//!
//! Production [`MediaUploader`] backed by a durable-storage HTTP service:
//! the payload goes up as a streamed multipart POST, the response body is
//! JSON carrying the durable URL. The request body is fed in 64 KiB chunks
//! through a channel so upload progress can be reported while the request
//! is in flight.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::config::MessagingConfig;
use crate::shared::{ConfigError, UploadError};
use crate::store::{MediaKind, MediaPayload, MediaUploader};
use crate::util;

/// Periodic progress report: percentage so far and bytes sent.
pub type ProgressCallback = Arc<dyn Fn(u8, u64) + Send + Sync>;

/// Body stream that counts the bytes handed to the transport.
struct ProgressTrackingStream {
    bytes_sent: Arc<Mutex<u64>>,
    inner: mpsc::Receiver<Result<Vec<u8>, std::io::Error>>,
}

impl ProgressTrackingStream {
    const CHUNK_SIZE: usize = 64 * 1024;

    fn new(data: Arc<Vec<u8>>, bytes_sent: Arc<Mutex<u64>>) -> Self {
        let (tx, rx) = mpsc::channel(8);

        // Feed the body from a background task so the request can stream
        tokio::spawn(async move {
            let mut position = 0;
            while position < data.len() {
                let end = std::cmp::min(position + Self::CHUNK_SIZE, data.len());
                let chunk = data[position..end].to_vec();
                position = end;

                if tx.send(Ok(chunk)).await.is_err() {
                    break; // receiver dropped, request is gone
                }
            }
        });

        Self { bytes_sent, inner: rx }
    }
}

impl futures_util::Stream for ProgressTrackingStream {
    type Item = Result<Vec<u8>, std::io::Error>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        match self.inner.poll_recv(cx) {
            Poll::Ready(Some(result)) => {
                if let Ok(chunk) = &result {
                    if let Ok(mut bytes_sent) = self.bytes_sent.lock() {
                        *bytes_sent += chunk.len() as u64;
                    }
                }
                Poll::Ready(Some(result))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Success response from the storage service.
#[derive(serde::Deserialize)]
struct UploadResponse {
    url: String,
}

pub struct HttpMediaUploader {
    client: Client,
    endpoint: Url,
    progress: Option<ProgressCallback>,
}

impl HttpMediaUploader {
    pub fn new(config: &MessagingConfig) -> Result<Self, ConfigError> {
        let endpoint = config
            .upload_endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::BadEndpoint("no upload endpoint configured".to_string()))?;
        let endpoint = Url::parse(endpoint).map_err(|e| ConfigError::BadEndpoint(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            progress: None,
        })
    }

    /// Report upload progress through `callback` while requests are in
    /// flight.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Normalize a payload to raw bytes plus a file extension.
    fn unpack(payload: MediaPayload) -> Result<(Arc<Vec<u8>>, String), UploadError> {
        match payload {
            MediaPayload::Bytes { bytes, extension } => Ok((bytes, extension)),
            MediaPayload::DataUrl(data_url) => {
                let (mime, bytes) = util::parse_data_url(&data_url)
                    .ok_or_else(|| UploadError::BadPayload("malformed data URL".to_string()))?;
                Ok((Arc::new(bytes), util::extension_from_mime(&mime)))
            }
        }
    }
}

#[async_trait]
impl MediaUploader for HttpMediaUploader {
    async fn upload(&self, payload: MediaPayload, kind: MediaKind) -> Result<String, UploadError> {
        let (bytes, extension) = Self::unpack(payload)?;
        let mime = util::mime_from_extension(&extension);
        let total_size = bytes.len() as u64;

        let bytes_sent = Arc::new(Mutex::new(0u64));
        let stream = ProgressTrackingStream::new(bytes, Arc::clone(&bytes_sent));

        let part = Part::stream(Body::wrap_stream(stream))
            .file_name(format!("upload.{}", extension))
            .mime_str(&mime)
            .map_err(|e| UploadError::BadPayload(e.to_string()))?;
        let form = Form::new()
            .text("kind", match kind {
                MediaKind::Image => "image",
                MediaKind::Audio => "audio",
            })
            .part("file", part);

        if let Some(progress) = &self.progress {
            progress(0, 0);
        }

        // Await the response while polling the sent-bytes counter so the
        // caller sees progress during the transfer, not just at the end
        let mut response_future = Box::pin(
            self.client
                .post(self.endpoint.clone())
                .multipart(form)
                .send(),
        );
        let mut last_percentage = 0u8;
        let mut poll_interval = tokio::time::interval(Duration::from_millis(100));

        let response = loop {
            tokio::select! {
                response = &mut response_future => {
                    break response.map_err(|e| UploadError::Transport(e.to_string()))?;
                },
                _ = poll_interval.tick() => {
                    if let Some(progress) = &self.progress {
                        let current = bytes_sent.lock().map(|b| *b).unwrap_or(0);
                        let percentage = if total_size > 0 {
                            ((current as f64 / total_size as f64) * 100.0) as u8
                        } else {
                            0
                        };
                        if percentage > last_percentage {
                            progress(percentage, current);
                            last_percentage = percentage;
                        }
                    }
                }
            }
        };

        if !response.status().is_success() {
            return Err(UploadError::Rejected(format!(
                "status {}",
                response.status()
            )));
        }

        if let Some(progress) = &self.progress {
            progress(100, total_size);
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Rejected(format!("undecodable response: {}", e)))?;

        debug!(url = %body.url, "media upload complete");
        Ok(body.url)
    }
}
