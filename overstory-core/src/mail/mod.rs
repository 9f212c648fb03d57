//! Mail Bus — durable inter-agent messaging: store, semantic client, and the
//! file-based auto-nudge layer that defers interrupts to a safe point in a
//! worker's own prompt cycle.

mod client;
mod nudge;
mod store;
mod types;

pub use client::{ClientResult, MailClient, MailClientError};
pub use nudge::{NudgeBoard, NudgeError, NudgeMarker, NudgeResult};
pub use store::{MailResult, MailStore, MailStoreError};
pub use types::{
    generate_message_id, MailPurgeOptions, Message, MessageQuery, MessageType, NewMessage, Priority,
};
