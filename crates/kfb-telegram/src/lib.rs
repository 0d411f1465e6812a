//! Telegram adapter (teloxide).
//!
//! This crate implements the `kfb-core` chat port over the Telegram Bot API.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatMemberKind, Recipient},
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use kfb_core::{
    domain::{ChatId, MessageId},
    errors::Error,
    ports::{ChatKind, ChatPort, ChatProfile, FetchedMessage, Membership},
    Result,
};

#[derive(Clone)]
pub struct TelegramChats {
    bot: Bot,
}

impl TelegramChats {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat.0)
    }

    fn tg_msg_id(id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(id.0)
    }

    /// `@username` (with or without the `@`) or a numeric chat id.
    fn recipient(ident: &str) -> Recipient {
        if let Ok(id) = ident.parse::<i64>() {
            return Recipient::Id(teloxide::types::ChatId(id));
        }
        let username = if ident.starts_with('@') {
            ident.to_string()
        } else {
            format!("@{ident}")
        };
        Recipient::ChannelUsername(username)
    }

    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::RetryAfter(d) => Error::RateLimited(d),
            RequestError::Api(api) if is_message_missing(&api) => Error::MessageMissing,
            other => Error::External(format!("telegram error: {other}")),
        }
    }

    /// Retry-once on flood control, for notices and lookups only. Copies go
    /// out without retry: the relay decides what a rate limit means.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    async fn own_membership(&self, chat: teloxide::types::ChatId) -> Membership {
        let Ok(me) = self.bot.get_me().await else {
            return Membership::NotMember;
        };
        match self.bot.get_chat_member(chat, me.user.id).await {
            Ok(member) => match member.kind {
                ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_) => Membership::Admin,
                ChatMemberKind::Left | ChatMemberKind::Banned(_) => Membership::NotMember,
                _ => Membership::Member,
            },
            Err(_) => Membership::NotMember,
        }
    }
}

fn is_message_missing(api: &ApiError) -> bool {
    matches!(api, ApiError::MessageIdInvalid)
        || api
            .to_string()
            .to_lowercase()
            .contains("message to copy not found")
}

#[async_trait]
impl ChatPort for TelegramChats {
    async fn resolve_chat(&self, ident: &str) -> Result<ChatProfile> {
        let recipient = Self::recipient(ident);
        let chat = self.with_retry(|| self.bot.get_chat(recipient.clone())).await?;

        let kind = if chat.is_channel() {
            ChatKind::Channel
        } else if chat.is_supergroup() {
            ChatKind::Supergroup
        } else if chat.is_group() {
            ChatKind::Group
        } else {
            ChatKind::Private
        };

        let title = chat
            .title()
            .map(str::to_string)
            .or_else(|| chat.username().map(|u| format!("@{u}")));

        let membership = self.own_membership(chat.id).await;

        Ok(ChatProfile {
            id: ChatId(chat.id.0),
            kind,
            title,
            membership,
        })
    }

    /// The Bot API has no message lookup, so presence is reported
    /// optimistically; a missing id surfaces at copy time instead and is
    /// mapped to `Error::MessageMissing` there.
    async fn fetch_message(
        &self,
        _chat: ChatId,
        id: MessageId,
    ) -> Result<Option<FetchedMessage>> {
        Ok(Some(FetchedMessage { id }))
    }

    async fn copy_message(&self, from: ChatId, to: ChatId, id: MessageId) -> Result<()> {
        // No retry here: a RetryAfter must reach the relay unconsumed so it
        // can hold the cursor and wait.
        self.bot
            .copy_message(Self::tg_chat(to), Self::tg_chat(from), Self::tg_msg_id(id))
            .await
            .map(|_| ())
            .map_err(Self::map_err)
    }

    async fn send_notice(&self, chat: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(Self::tg_chat(chat), text.to_string()))
            .await?;
        Ok(())
    }
}
