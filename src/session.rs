//! Conversation session coordination.
//!
//! [`ConversationSession`] is the top-level state machine tying the derived
//! views together: it moves between the inbox and one open conversation,
//! fires the mark-read side effect on open, and routes outbound messages
//! through the composer into the store. It never inserts messages
//! optimistically; the store's returned record is the only source of new
//! local state, so a failed send leaves every view unchanged.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::inbox;
use crate::message::{
    AttachmentFile, ConversationKey, Listing, Message, MessageComposer, OutboundContent, User,
};
use crate::shared::{ComposeError, StoreError};
use crate::store::{MediaUploader, MessageDraft, MessageSnapshot, MessageStore};
use crate::stream::ConversationStream;
use crate::voice::Recording;

/// Which view the session is presenting.
#[derive(Clone, Debug)]
pub enum SessionView {
    Inbox,
    Conversation { partner: User, listing: Listing },
}

pub struct ConversationSession {
    store: Arc<dyn MessageStore>,
    composer: MessageComposer,
    viewer: User,
    view: SessionView,
}

impl ConversationSession {
    pub fn new(
        viewer: User,
        store: Arc<dyn MessageStore>,
        uploader: Arc<dyn MediaUploader>,
    ) -> Self {
        Self {
            store,
            composer: MessageComposer::new(uploader),
            viewer,
            view: SessionView::Inbox,
        }
    }

    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// The open conversation's (partner, listing), if any.
    pub fn active_conversation(&self) -> Option<(&User, &Listing)> {
        match &self.view {
            SessionView::Conversation { partner, listing } => Some((partner, listing)),
            SessionView::Inbox => None,
        }
    }

    /// Current snapshot of the viewer's messages, for feeding the derived
    /// views.
    pub async fn snapshot(&self) -> Result<MessageSnapshot, StoreError> {
        self.store.snapshot_for(&self.viewer.id).await
    }

    /// A stream over the open conversation, or `None` from the inbox.
    pub fn stream(&self) -> Option<ConversationStream> {
        self.active_conversation().map(|(partner, listing)| {
            ConversationStream::new(
                self.viewer.id.clone(),
                ConversationKey::new(partner.id.clone(), listing.id.clone()),
            )
        })
    }

    /// Open the conversation with `partner` about `listing`.
    ///
    /// Any unread message the viewer received in this conversation is marked
    /// read through the store first. That side effect is fire-and-forget:
    /// a failure is logged and the transition happens anyway, since the
    /// messages stay unread and the next open will retry. Returns how many
    /// messages were marked.
    pub async fn open_conversation(&mut self, partner: User, listing: Listing) -> usize {
        let key = ConversationKey::new(partner.id.clone(), listing.id.clone());

        let marked = match self.store.snapshot_for(&self.viewer.id).await {
            Ok(snapshot) => {
                let ids = inbox::unread_ids_for_key(&snapshot, &self.viewer.id, &key);
                if ids.is_empty() {
                    0
                } else {
                    match self.store.mark_read(&ids).await {
                        Ok(()) => ids.len(),
                        Err(e) => {
                            warn!(error = %e, "mark-read failed, unread state will self-heal on next open");
                            0
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "could not snapshot messages while opening conversation");
                0
            }
        };

        debug!(
            partner = %partner.id,
            listing = %listing.id,
            marked,
            "conversation opened"
        );
        self.view = SessionView::Conversation { partner, listing };
        marked
    }

    /// Return to the inbox, discarding the conversation context. Any
    /// in-progress recording is the capture controller's to cancel; its
    /// teardown cleanup is guaranteed on drop.
    pub fn close_conversation(&mut self) {
        self.view = SessionView::Inbox;
    }

    /// Send a text message to the open conversation. Whitespace-only input
    /// is a no-op returning `Ok(None)`: no request is composed, nothing is
    /// appended.
    pub async fn send_text(&self, body: &str) -> Result<Option<Message>, ComposeError> {
        // Fail fast before composing; sending is only valid in a conversation
        if self.active_conversation().is_none() {
            return Err(ComposeError::NoActiveConversation);
        }
        match self.composer.compose_text(body) {
            Some(outbound) => self.append(outbound).await.map(Some),
            None => Ok(None),
        }
    }

    /// Upload a selected image and send it to the open conversation.
    pub async fn send_image(&self, image: AttachmentFile) -> Result<Message, ComposeError> {
        if self.active_conversation().is_none() {
            return Err(ComposeError::NoActiveConversation);
        }
        let outbound = self.composer.compose_image(image).await?;
        self.append(outbound).await
    }

    /// Upload a finalized voice recording and send it to the open
    /// conversation.
    pub async fn send_audio(&self, recording: Recording) -> Result<Message, ComposeError> {
        if self.active_conversation().is_none() {
            return Err(ComposeError::NoActiveConversation);
        }
        let outbound = self.composer.compose_audio(recording).await?;
        self.append(outbound).await
    }

    async fn append(&self, outbound: OutboundContent) -> Result<Message, ComposeError> {
        let (partner, listing) = self
            .active_conversation()
            .ok_or(ComposeError::NoActiveConversation)?;

        let draft = MessageDraft {
            sender_id: self.viewer.id.clone(),
            receiver_id: partner.id.clone(),
            listing_id: listing.id.clone(),
            kind: outbound.kind,
            content: outbound.content,
        };

        Ok(self.store.append(draft).await?)
    }
}
