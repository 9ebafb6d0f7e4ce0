//! Per-conversation message stream derivation.
//!
//! Given a snapshot, a viewer and a conversation key, the stream is the
//! ascending subsequence of messages exchanged between viewer and partner
//! about one listing. [`ConversationStream`] wraps the pure derivation with
//! a per-snapshot-version cache and follow-latest tracking for the view.

use crate::message::{ConversationKey, Message};
use crate::store::MessageSnapshot;

/// Derive the ordered message list for one conversation.
///
/// Includes exactly the messages where (sender=viewer, receiver=partner) or
/// (sender=partner, receiver=viewer) and the listing matches, ascending by
/// store timestamp. Equal timestamps keep store order (stable sort).
pub fn conversation_messages(
    snapshot: &MessageSnapshot,
    viewer: &str,
    key: &ConversationKey,
) -> Vec<Message> {
    let mut messages: Vec<Message> = snapshot
        .messages()
        .iter()
        .filter(|m| key.matches(viewer, m))
        .cloned()
        .collect();
    messages.sort_by_key(|m| m.at);
    messages
}

/// The live view over one conversation's messages.
///
/// Holds the most recent derivation keyed by snapshot version, so repeated
/// reads against an unchanged collection cost nothing, and reports when a
/// newer snapshot appended messages so the view can scroll to the latest.
pub struct ConversationStream {
    viewer: String,
    key: ConversationKey,
    follow_latest: bool,
    cached: Option<(u64, Vec<Message>)>,
    pending_scroll: bool,
}

impl ConversationStream {
    pub fn new(viewer: impl Into<String>, key: ConversationKey) -> Self {
        Self {
            viewer: viewer.into(),
            key,
            follow_latest: true,
            cached: None,
            pending_scroll: false,
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Disable or re-enable scroll-to-latest, e.g. while the user is reading
    /// history.
    pub fn set_follow_latest(&mut self, follow: bool) {
        self.follow_latest = follow;
    }

    /// The conversation's messages as of `snapshot`, recomputing only when
    /// the snapshot version changed since the last call.
    pub fn messages(&mut self, snapshot: &MessageSnapshot) -> &[Message] {
        let version = snapshot.version();
        let stale = match &self.cached {
            Some((cached_version, _)) => *cached_version != version,
            None => true,
        };

        if stale {
            let previous_len = self.cached.as_ref().map(|(_, m)| m.len()).unwrap_or(0);
            let messages = conversation_messages(snapshot, &self.viewer, &self.key);
            if self.follow_latest && messages.len() > previous_len {
                self.pending_scroll = true;
            }
            self.cached = Some((version, messages));
        }

        &self.cached.as_ref().unwrap().1
    }

    /// Whether the last recompute grew the list while follow-latest was on.
    /// Reading the flag clears it.
    pub fn take_scroll_to_latest(&mut self) -> bool {
        std::mem::take(&mut self.pending_scroll)
    }
}
