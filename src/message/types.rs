//! Message types and data structures.
//!
//! This module contains:
//! - Message and MessageKind, the stored record shape
//! - User and Listing, the host-supplied identity types
//! - ConversationKey, the derived thread identity
//! - AttachmentFile, the pre-upload byte payload

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single stored message. Immutable once created, except for the `read`
/// flag which only ever flips from `false` to `true`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    /// Opaque, store-assigned identifier.
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub listing_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text body, or a durable URL for media messages.
    pub content: String,
    /// Store-assigned creation time, unix milliseconds. The store guarantees
    /// these form a single linear order.
    pub at: u64,
    pub read: bool,
}

impl Message {
    /// Whether `user` participates in this message at all.
    pub fn involves(&self, user: &str) -> bool {
        self.sender_id == user || self.receiver_id == user
    }

    /// Short inbox-row preview for this message.
    pub fn preview(&self) -> &str {
        match self.kind {
            MessageKind::Image => "[image]",
            MessageKind::Audio => "[voice message]",
            MessageKind::Text => &self.content,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
}

/// A marketplace user, as supplied by the host application.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
}

/// A marketplace listing, as supplied by the host application.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: String,
}

/// Derived identity of one messaging thread from a viewer's perspective.
///
/// Two messages belong to the same conversation iff they share this key.
/// The key is partner plus listing, not the user pair alone: the same two
/// users may hold independent conversations about different listings.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub partner_id: String,
    pub listing_id: String,
}

impl ConversationKey {
    pub fn new(partner_id: impl Into<String>, listing_id: impl Into<String>) -> Self {
        Self {
            partner_id: partner_id.into(),
            listing_id: listing_id.into(),
        }
    }

    /// Derive the key of `message` relative to `viewer`, or `None` when the
    /// viewer is not a participant.
    pub fn of(viewer: &str, message: &Message) -> Option<Self> {
        let partner_id = if message.sender_id == viewer {
            message.receiver_id.clone()
        } else if message.receiver_id == viewer {
            message.sender_id.clone()
        } else {
            return None;
        };
        Some(Self {
            partner_id,
            listing_id: message.listing_id.clone(),
        })
    }

    /// Whether `message` belongs to this conversation from `viewer`'s side.
    pub fn matches(&self, viewer: &str, message: &Message) -> bool {
        message.listing_id == self.listing_id
            && ((message.sender_id == viewer && message.receiver_id == self.partner_id)
                || (message.sender_id == self.partner_id && message.receiver_id == viewer))
    }
}

/// A byte payload staged for upload, associated with its file extension.
///
/// The bytes sit behind an `Arc` so staging a large file for retry does not
/// copy it.
#[derive(Clone, Debug)]
pub struct AttachmentFile {
    pub bytes: Arc<Vec<u8>>,
    pub extension: String,
}

impl AttachmentFile {
    pub fn new(bytes: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            bytes: Arc::new(bytes),
            extension: extension.into(),
        }
    }
}
