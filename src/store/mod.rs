//! External collaborator contracts: the message repository and the durable
//! media uploader.
//!
//! The messaging core owns no durable state. Messages live behind a
//! [`MessageStore`] handle injected at construction time, media bytes behind
//! a [`MediaUploader`]. Both are async traits so hosts can back them with a
//! document database and object storage; [`memory::MemoryStore`] is the
//! reference implementation used in tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::{Message, MessageKind};
use crate::shared::{StoreError, UploadError};

mod memory;

pub use memory::{MemoryStore, MemoryUploader};

/// An outbound message before the store assigns `id` and `at`.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageDraft {
    pub sender_id: String,
    pub receiver_id: String,
    pub listing_id: String,
    pub kind: MessageKind,
    pub content: String,
}

/// An immutable view of the message collection at one point in time.
///
/// Derivations (inbox, conversation stream) are pure functions over a
/// snapshot; the version number lets them cache per-snapshot results.
#[derive(Clone, Debug)]
pub struct MessageSnapshot {
    version: u64,
    messages: Arc<Vec<Message>>,
}

impl MessageSnapshot {
    pub fn new(version: u64, messages: Vec<Message>) -> Self {
        Self {
            version,
            messages: Arc::new(messages),
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Monotonically increasing revision of the underlying collection.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// The message repository contract.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a new message. The store assigns `id` and a `created_at`
    /// timestamp that extends its single linear order, and returns the
    /// stored record.
    async fn append(&self, draft: MessageDraft) -> Result<Message, StoreError>;

    /// All messages between two users about one listing, in store order.
    async fn query_by_participants(
        &self,
        user_a: &str,
        user_b: &str,
        listing_id: &str,
    ) -> Result<Vec<Message>, StoreError>;

    /// Flip the `read` flag to true for each given message id. One-way: a
    /// read message never becomes unread again.
    async fn mark_read(&self, ids: &[String]) -> Result<(), StoreError>;

    /// Snapshot of every message the viewer participates in.
    async fn snapshot_for(&self, viewer: &str) -> Result<MessageSnapshot, StoreError>;
}

/// Media payload handed to the uploader: raw bytes, or the client-side
/// data-URL representation the composer produces for images.
#[derive(Clone, Debug)]
pub enum MediaPayload {
    Bytes { bytes: Arc<Vec<u8>>, extension: String },
    DataUrl(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

/// Durable media storage round trip: accept a payload, return a URL that
/// outlives the session.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, payload: MediaPayload, kind: MediaKind) -> Result<String, UploadError>;
}
