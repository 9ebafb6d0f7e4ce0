//! In-memory reference implementations of the store contracts.
//!
//! `MemoryStore` holds the full message collection behind one async mutex,
//! assigns sequential ids and strictly monotonic timestamps, and bumps a
//! version counter on every mutation so snapshot consumers can cache.
//! Constructed once and passed around by handle; nothing lives in module
//! scope.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::message::Message;
use crate::shared::{StoreError, UploadError};
use crate::util;

use super::{MediaKind, MediaPayload, MediaUploader, MessageDraft, MessageSnapshot, MessageStore};

#[derive(Default)]
struct StoreInner {
    messages: Vec<Message>,
    next_id: u64,
    last_at: u64,
    version: u64,
}

/// In-memory [`MessageStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with pre-existing messages, e.g. fixtures. Timestamps
    /// of seeded messages are taken as-is; subsequent appends extend past
    /// the largest one.
    pub async fn seed(&self, messages: Vec<Message>) {
        let mut inner = self.inner.lock().await;
        inner.next_id += messages.len() as u64;
        inner.last_at = inner
            .last_at
            .max(messages.iter().map(|m| m.at).max().unwrap_or(0));
        inner.messages.extend(messages);
        inner.version += 1;
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, draft: MessageDraft) -> Result<Message, StoreError> {
        if draft.sender_id == draft.receiver_id {
            return Err(StoreError::InvalidDraft(
                "sender and receiver must differ".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        // Strictly monotonic: two appends within the same millisecond still
        // get distinct, ordered timestamps.
        let at = util::now_ms().max(inner.last_at + 1);
        inner.last_at = at;

        let message = Message {
            id: format!("msg-{}", inner.next_id),
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            listing_id: draft.listing_id,
            kind: draft.kind,
            content: draft.content,
            at,
            read: false,
        };
        inner.messages.push(message.clone());
        inner.version += 1;
        Ok(message)
    }

    async fn query_by_participants(
        &self,
        user_a: &str,
        user_b: &str,
        listing_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| {
                m.listing_id == listing_id
                    && ((m.sender_id == user_a && m.receiver_id == user_b)
                        || (m.sender_id == user_b && m.receiver_id == user_a))
            })
            .cloned()
            .collect())
    }

    async fn mark_read(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock().await;
        let mut changed = false;
        for message in inner.messages.iter_mut() {
            if !message.read && ids.iter().any(|id| *id == message.id) {
                message.read = true;
                changed = true;
            }
        }
        if changed {
            inner.version += 1;
        }
        Ok(())
    }

    async fn snapshot_for(&self, viewer: &str) -> Result<MessageSnapshot, StoreError> {
        let inner = self.inner.lock().await;
        let messages = inner
            .messages
            .iter()
            .filter(|m| m.involves(viewer))
            .cloned()
            .collect();
        Ok(MessageSnapshot::new(inner.version, messages))
    }
}

/// In-memory [`MediaUploader`] that "stores" payloads and hands back fake
/// durable URLs. Reference implementation for tests and offline hosts.
#[derive(Default)]
pub struct MemoryUploader {
    stored: Mutex<Vec<(MediaKind, usize)>>,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payloads uploaded so far.
    pub async fn upload_count(&self) -> usize {
        self.stored.lock().await.len()
    }
}

#[async_trait]
impl MediaUploader for MemoryUploader {
    async fn upload(&self, payload: MediaPayload, kind: MediaKind) -> Result<String, UploadError> {
        let (size, extension) = match payload {
            MediaPayload::Bytes { bytes, extension } => (bytes.len(), extension),
            MediaPayload::DataUrl(url) => {
                let (mime, bytes) = util::parse_data_url(&url)
                    .ok_or_else(|| UploadError::BadPayload("malformed data URL".to_string()))?;
                (bytes.len(), util::extension_from_mime(&mime))
            }
        };

        let mut stored = self.stored.lock().await;
        stored.push((kind, size));
        Ok(format!("memory://media/{}.{}", stored.len(), extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn draft(sender: &str, receiver: &str, listing: &str, content: &str) -> MessageDraft {
        MessageDraft {
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            listing_id: listing.into(),
            kind: MessageKind::Text,
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_timestamps() {
        let store = MemoryStore::new();
        let a = store.append(draft("alice", "bob", "bike", "one")).await.unwrap();
        let b = store.append(draft("alice", "bob", "bike", "two")).await.unwrap();
        let c = store.append(draft("bob", "alice", "bike", "three")).await.unwrap();

        assert!(a.at < b.at && b.at < c.at);
        assert_ne!(a.id, b.id);
        assert!(!a.read);
    }

    #[tokio::test]
    async fn test_append_rejects_self_message() {
        let store = MemoryStore::new();
        let err = store.append(draft("alice", "alice", "bike", "hi")).await;
        assert!(matches!(err, Err(StoreError::InvalidDraft(_))));
    }

    #[tokio::test]
    async fn test_mark_read_is_one_way_and_bumps_version() {
        let store = MemoryStore::new();
        let m = store.append(draft("alice", "bob", "bike", "hi")).await.unwrap();

        let before = store.snapshot_for("bob").await.unwrap();
        store.mark_read(&[m.id.clone()]).await.unwrap();
        let after = store.snapshot_for("bob").await.unwrap();

        assert!(!before.messages()[0].read);
        assert!(after.messages()[0].read);
        assert!(after.version() > before.version());

        // Marking again is a no-op and does not invalidate caches
        store.mark_read(&[m.id]).await.unwrap();
        let again = store.snapshot_for("bob").await.unwrap();
        assert_eq!(again.version(), after.version());
        assert!(again.messages()[0].read);
    }

    #[tokio::test]
    async fn test_snapshot_only_contains_viewer_messages() {
        let store = MemoryStore::new();
        store.append(draft("alice", "bob", "bike", "a")).await.unwrap();
        store.append(draft("carol", "dave", "sofa", "b")).await.unwrap();

        let snap = store.snapshot_for("alice").await.unwrap();
        assert_eq!(snap.messages().len(), 1);
        assert_eq!(snap.messages()[0].content, "a");
    }

    #[tokio::test]
    async fn test_query_by_participants_filters_listing() {
        let store = MemoryStore::new();
        store.append(draft("alice", "bob", "bike", "a")).await.unwrap();
        store.append(draft("bob", "alice", "bike", "b")).await.unwrap();
        store.append(draft("alice", "bob", "sofa", "c")).await.unwrap();

        let msgs = store.query_by_participants("alice", "bob", "bike").await.unwrap();
        assert_eq!(msgs.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_uploader_round_trip() {
        let uploader = MemoryUploader::new();
        let url = uploader
            .upload(
                MediaPayload::DataUrl(util::to_data_url("image/png", &[1, 2, 3])),
                MediaKind::Image,
            )
            .await
            .unwrap();
        assert!(url.starts_with("memory://media/"));
        assert!(url.ends_with(".png"));
        assert_eq!(uploader.upload_count().await, 1);
    }
}
