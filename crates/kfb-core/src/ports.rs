use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId},
    Result,
};

/// What kind of chat an identifier resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Channel,
    Group,
    Supergroup,
    Private,
}

/// The bot's own standing in a chat, for setup-command validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    Admin,
    Member,
    NotMember,
}

/// Resolved chat info consumed by the setup commands and `/status`.
#[derive(Clone, Debug)]
pub struct ChatProfile {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub membership: Membership,
}

/// A message looked up in the source chat. The relay only needs to know the
/// message exists; its content stays on the transport side of the copy call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchedMessage {
    pub id: MessageId,
}

/// Hexagonal port for chat connectivity.
///
/// Telegram is the first implementation; the relay core only ever talks to
/// this trait, so tests drive it with a scripted in-memory fake.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Resolve `@username` or a numeric id to a chat profile.
    async fn resolve_chat(&self, ident: &str) -> Result<ChatProfile>;

    /// Look up a single message in a chat; `None` if it does not exist.
    async fn fetch_message(&self, chat: ChatId, id: MessageId)
        -> Result<Option<FetchedMessage>>;

    /// Copy a message into `to` as a new message (no "forwarded from" header,
    /// original content and formatting preserved).
    async fn copy_message(&self, from: ChatId, to: ChatId, id: MessageId) -> Result<()>;

    /// Plain-text notice to a chat (outcome reports, command replies).
    async fn send_notice(&self, chat: ChatId, text: &str) -> Result<()>;
}
