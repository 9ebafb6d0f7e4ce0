//! Inbox derivation: one row per conversation, newest first.
//!
//! Pure functions over a [`MessageSnapshot`]; nothing here owns durable
//! state. Recomputed whenever the snapshot version changes.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::message::{ConversationKey, Listing, Message, User};
use crate::store::MessageSnapshot;

/// A derived inbox row: the partner, the listing under discussion, and the
/// most recent message of that conversation.
#[derive(Serialize, Clone, Debug)]
pub struct InboxEntry {
    pub partner: User,
    pub listing: Listing,
    pub last_message: Message,
    /// Whether the viewer sent the last message (inbox rows prefix the
    /// preview with a "you" marker when so).
    pub last_is_mine: bool,
    /// Unread messages the viewer has received in this conversation.
    pub unread: usize,
}

/// Derive the inbox for `viewer`: one entry per distinct (partner, listing)
/// key, each keyed by the message with the greatest timestamp, sorted
/// descending by that timestamp.
///
/// Messages whose partner or listing cannot be resolved through the lookup
/// maps are excluded; their key cannot be formed. That is a defined
/// degradation, not an error. Ties on equal timestamps keep store order
/// (the sort is stable).
pub fn inbox_entries(
    snapshot: &MessageSnapshot,
    viewer: &str,
    users_by_id: &HashMap<String, User>,
    listings_by_id: &HashMap<String, Listing>,
) -> Vec<InboxEntry> {
    let mut index: HashMap<ConversationKey, usize> = HashMap::new();
    let mut entries: Vec<InboxEntry> = Vec::new();
    let mut dropped = 0usize;

    for message in snapshot.messages() {
        let Some(key) = ConversationKey::of(viewer, message) else {
            continue;
        };

        let (Some(partner), Some(listing)) = (
            users_by_id.get(&key.partner_id),
            listings_by_id.get(&key.listing_id),
        ) else {
            dropped += 1;
            continue;
        };

        let unread_here = (message.receiver_id == viewer && !message.read) as usize;
        match index.get(&key) {
            Some(&slot) => {
                let entry = &mut entries[slot];
                entry.unread += unread_here;
                if message.at > entry.last_message.at {
                    entry.last_message = message.clone();
                    entry.last_is_mine = message.sender_id == viewer;
                }
            }
            None => {
                index.insert(key, entries.len());
                entries.push(InboxEntry {
                    partner: partner.clone(),
                    listing: listing.clone(),
                    last_message: message.clone(),
                    last_is_mine: message.sender_id == viewer,
                    unread: unread_here,
                });
            }
        }
    }

    if dropped > 0 {
        debug!(dropped, "inbox derivation skipped messages with unresolvable keys");
    }

    // Newest conversation first; stable, so equal timestamps keep store order
    entries.sort_by(|a, b| b.last_message.at.cmp(&a.last_message.at));
    entries
}

/// Total unread messages the viewer has received, across all conversations.
pub fn unread_count(snapshot: &MessageSnapshot, viewer: &str) -> usize {
    snapshot
        .messages()
        .iter()
        .filter(|m| m.receiver_id == viewer && !m.read)
        .count()
}

/// Ids of unread messages the viewer received from `key`'s partner about
/// `key`'s listing. This is exactly the set the session marks read when the
/// conversation opens.
pub fn unread_ids_for_key(
    snapshot: &MessageSnapshot,
    viewer: &str,
    key: &ConversationKey,
) -> Vec<String> {
    snapshot
        .messages()
        .iter()
        .filter(|m| {
            m.receiver_id == viewer
                && m.sender_id == key.partner_id
                && m.listing_id == key.listing_id
                && !m.read
        })
        .map(|m| m.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            name: id.to_uppercase(),
            avatar_url: format!("https://cdn.example.com/{id}.png"),
        }
    }

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.into(),
            title: format!("listing {id}"),
        }
    }

    fn msg(id: &str, sender: &str, receiver: &str, listing: &str, at: u64, read: bool) -> Message {
        Message {
            id: id.into(),
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            listing_id: listing.into(),
            kind: MessageKind::Text,
            content: format!("body of {id}"),
            at,
            read,
        }
    }

    fn lookups() -> (HashMap<String, User>, HashMap<String, Listing>) {
        let users = ["alice", "bob", "carol"]
            .into_iter()
            .map(|id| (id.to_string(), user(id)))
            .collect();
        let listings = ["bike", "sofa"]
            .into_iter()
            .map(|id| (id.to_string(), listing(id)))
            .collect();
        (users, listings)
    }

    #[test]
    fn test_one_entry_per_key_latest_message_wins() {
        let (users, listings) = lookups();
        let snapshot = MessageSnapshot::new(
            1,
            vec![
                msg("m1", "bob", "alice", "bike", 10, true),
                msg("m2", "alice", "bob", "bike", 20, false),
                msg("m3", "bob", "alice", "sofa", 15, false),
            ],
        );

        let entries = inbox_entries(&snapshot, "alice", &users, &listings);
        assert_eq!(entries.len(), 2);

        // bike conversation is newer (at=20) and its last message is ours
        assert_eq!(entries[0].listing.id, "bike");
        assert_eq!(entries[0].last_message.id, "m2");
        assert!(entries[0].last_is_mine);

        assert_eq!(entries[1].listing.id, "sofa");
        assert!(!entries[1].last_is_mine);
    }

    #[test]
    fn test_same_partner_different_listing_is_two_conversations() {
        let (users, listings) = lookups();
        let snapshot = MessageSnapshot::new(
            1,
            vec![
                msg("m1", "bob", "alice", "bike", 10, false),
                msg("m2", "bob", "alice", "sofa", 11, false),
            ],
        );

        let entries = inbox_entries(&snapshot, "alice", &users, &listings);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_unresolvable_partner_or_listing_is_excluded() {
        let (users, listings) = lookups();
        let snapshot = MessageSnapshot::new(
            1,
            vec![
                msg("m1", "ghost", "alice", "bike", 10, false),
                msg("m2", "bob", "alice", "deleted-listing", 11, false),
                msg("m3", "bob", "alice", "bike", 12, false),
            ],
        );

        let entries = inbox_entries(&snapshot, "alice", &users, &listings);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].last_message.id, "m3");
    }

    #[test]
    fn test_sorted_descending_by_recency() {
        let (users, listings) = lookups();
        let snapshot = MessageSnapshot::new(
            1,
            vec![
                msg("m1", "bob", "alice", "bike", 5, true),
                msg("m2", "carol", "alice", "bike", 50, true),
                msg("m3", "bob", "alice", "sofa", 25, true),
            ],
        );

        let entries = inbox_entries(&snapshot, "alice", &users, &listings);
        let order: Vec<&str> = entries.iter().map(|e| e.partner.id.as_str()).collect();
        assert_eq!(order, vec!["carol", "bob", "bob"]);
        assert!(entries.windows(2).all(|w| w[0].last_message.at >= w[1].last_message.at));
    }

    #[test]
    fn test_unread_counts_only_received_unread() {
        let (users, listings) = lookups();
        let snapshot = MessageSnapshot::new(
            1,
            vec![
                msg("m1", "bob", "alice", "bike", 1, false),
                msg("m2", "bob", "alice", "bike", 2, false),
                msg("m3", "alice", "bob", "bike", 3, false), // sent, not unread for alice
                msg("m4", "bob", "alice", "bike", 4, true),
            ],
        );

        let entries = inbox_entries(&snapshot, "alice", &users, &listings);
        assert_eq!(entries[0].unread, 2);
        assert_eq!(unread_count(&snapshot, "alice"), 2);
    }

    #[test]
    fn test_unread_ids_for_key_scoped_to_partner_and_listing() {
        let snapshot = MessageSnapshot::new(
            1,
            vec![
                msg("m1", "bob", "alice", "bike", 1, false),
                msg("m2", "bob", "alice", "sofa", 2, false),
                msg("m3", "carol", "alice", "bike", 3, false),
                msg("m4", "alice", "bob", "bike", 4, false),
            ],
        );

        let ids = unread_ids_for_key(&snapshot, "alice", &ConversationKey::new("bob", "bike"));
        assert_eq!(ids, vec!["m1".to_string()]);
    }
}
