//! Core conversation and messaging library for Muqayada, a peer-to-peer
//! barter marketplace.
//!
//! The crate covers the messaging subsystem end to end:
//! - inbox derivation (one row per partner-and-listing conversation)
//! - the per-conversation message stream with read-state side effects
//! - outbound composition of text, image and voice messages
//! - voice capture over the microphone, with cleanup on every exit path
//! - per-message audio playback state
//!
//! Durable state lives behind the [`store::MessageStore`] and
//! [`store::MediaUploader`] contracts injected by the host application;
//! everything the crate derives is a pure projection over an immutable
//! [`store::MessageSnapshot`].

pub mod audio;
pub mod config;
pub mod inbox;
pub mod message;
pub mod playback;
pub mod session;
pub mod shared;
pub mod store;
pub mod stream;
pub mod upload;
pub mod util;
pub mod voice;

pub use config::MessagingConfig;
pub use inbox::{inbox_entries, unread_count, InboxEntry};
pub use message::{
    AttachmentFile, ConversationKey, Listing, Message, MessageComposer, MessageKind, User,
};
pub use playback::{AudioPlaybackController, MediaEvent, PlaybackCommand, PlaybackState};
pub use session::{ConversationSession, SessionView};
pub use shared::{CaptureError, ComposeError, StoreError, UploadError};
pub use store::{
    MediaKind, MediaPayload, MediaUploader, MemoryStore, MemoryUploader, MessageDraft,
    MessageSnapshot, MessageStore,
};
pub use stream::{conversation_messages, ConversationStream};
pub use upload::HttpMediaUploader;
pub use voice::{AudioCaptureController, CaptureBackend, CaptureHandle, CaptureState, Recording};
