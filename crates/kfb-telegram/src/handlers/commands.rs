use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use kfb_core::{
    domain::{ChatId, MessageId, UserId},
    ports::{ChatKind, ChatProfile, Membership},
    relay::RangeStatus,
};

use crate::router::AppState;

const HELP: &str = "🤖 Keyword Forward Bot

Commands
/setsource <chat_id|@username> – Set source channel
/settarget <chat_id|@username> – Set target group/channel
/setrange <first_id> <last_id> – Set message ID range (inclusive)
/setkeyword <text> – Set trigger keyword (default: Completed)
/status – Show current settings & progress
/reset – Clear all settings

How it works
When the bot sees the keyword in the target chat, it forwards the next \
message from the configured range in the source to the target, one by one, \
until it reaches the last ID.

Notes
• Add the bot to both chats.
• The bot must be able to read the source channel and send in the target chat.";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// An empty admin list means the configuration commands are open to everyone.
fn is_admin(admin_users: &[i64], user: Option<UserId>) -> bool {
    if admin_users.is_empty() {
        return true;
    }
    user.map(|u| admin_users.contains(&u.0)).unwrap_or(false)
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let (cmd, args) = parse_command(text);
    let chat = ChatId(msg.chat.id.0);
    let user = msg.from().map(|u| UserId(u.id.0 as i64));

    match cmd.as_str() {
        "start" | "help" => {
            bot.send_message(msg.chat.id, HELP).await?;
        }
        "setsource" | "settarget" | "setrange" | "setkeyword" | "reset"
            if !is_admin(&state.cfg.admin_users, user) =>
        {
            notify(&state, chat, "Unauthorized. Contact the bot owner for access.").await;
        }
        "setsource" => set_source(&state, chat, &args).await,
        "settarget" => set_target(&state, chat, &args).await,
        "setrange" => set_range(&state, chat, &args).await,
        "setkeyword" => set_keyword(&state, chat, &args).await,
        "status" => send_status(&state, chat).await,
        "reset" => {
            state.relay.reset().await;
            notify(&state, chat, "✅ Settings reset. Keyword reverted to the default.").await;
        }
        // Not one of ours; stay quiet.
        _ => {}
    }

    Ok(())
}

async fn notify(state: &AppState, chat: ChatId, text: &str) {
    if let Err(e) = state.chats.send_notice(chat, text).await {
        warn!("notice to chat {} failed: {e}", chat.0);
    }
}

fn check_source(profile: &ChatProfile) -> Result<(), &'static str> {
    if !matches!(
        profile.kind,
        ChatKind::Channel | ChatKind::Group | ChatKind::Supergroup
    ) {
        return Err("Source must be a channel or group");
    }
    if profile.membership == Membership::NotMember {
        // Reading a channel requires membership, nothing more.
        return Err("Bot is not a member of the source");
    }
    Ok(())
}

fn check_target(profile: &ChatProfile) -> Result<(), &'static str> {
    if !matches!(
        profile.kind,
        ChatKind::Channel | ChatKind::Group | ChatKind::Supergroup
    ) {
        return Err("Target must be a channel or group");
    }
    match profile.membership {
        Membership::NotMember => Err("Bot is not a member of the target"),
        Membership::Admin => Ok(()),
        // Non-admin is fine in groups; posting to a channel needs admin.
        Membership::Member
            if matches!(profile.kind, ChatKind::Group | ChatKind::Supergroup) =>
        {
            Ok(())
        }
        Membership::Member => Err("Bot must be admin in the target channel to post"),
    }
}

async fn set_source(state: &AppState, chat: ChatId, args: &str) {
    if args.is_empty() {
        notify(state, chat, "Usage: /setsource <chat_id|@username>").await;
        return;
    }
    match state.chats.resolve_chat(args).await {
        Ok(profile) => match check_source(&profile) {
            Ok(()) => {
                state.relay.set_source(profile.id).await;
                notify(state, chat, &format!("✅ Source set to {}", profile.id.0)).await;
            }
            Err(reason) => {
                notify(state, chat, &format!("❌ Source check failed: {reason}")).await;
            }
        },
        Err(e) => notify(state, chat, &format!("❌ Failed to set source: {e}")).await,
    }
}

async fn set_target(state: &AppState, chat: ChatId, args: &str) {
    if args.is_empty() {
        notify(state, chat, "Usage: /settarget <chat_id|@username>").await;
        return;
    }
    match state.chats.resolve_chat(args).await {
        Ok(profile) => match check_target(&profile) {
            Ok(()) => {
                state.relay.set_target(profile.id).await;
                notify(state, chat, &format!("✅ Target set to {}", profile.id.0)).await;
            }
            Err(reason) => {
                notify(state, chat, &format!("❌ Target check failed: {reason}")).await;
            }
        },
        Err(e) => notify(state, chat, &format!("❌ Failed to set target: {e}")).await,
    }
}

async fn set_range(state: &AppState, chat: ChatId, args: &str) {
    let mut parts = args.split_whitespace();
    let (Some(first), Some(last)) = (parts.next(), parts.next()) else {
        notify(state, chat, "Usage: /setrange <first_id> <last_id>").await;
        return;
    };
    let (Ok(first), Ok(last)) = (first.parse::<i32>(), last.parse::<i32>()) else {
        notify(state, chat, "❌ first_id and last_id must be integers").await;
        return;
    };

    let (low, high) = state
        .relay
        .set_range(MessageId(first), MessageId(last))
        .await;
    notify(
        state,
        chat,
        &format!("✅ Range set to {}..{} (next: {})", low.0, high.0, low.0),
    )
    .await;
}

async fn set_keyword(state: &AppState, chat: ChatId, args: &str) {
    if args.trim().is_empty() {
        notify(
            state,
            chat,
            "Usage: /setkeyword <text>\nExample: /setkeyword Completed",
        )
        .await;
        return;
    }
    if state.relay.set_keyword(args).await {
        notify(state, chat, &format!("✅ Keyword set to: {}", args.trim())).await;
    } else {
        notify(state, chat, "❌ Keyword must not be empty").await;
    }
}

async fn send_status(state: &AppState, chat: ChatId) {
    let snap = state.relay.status().await;

    let source = name_or_id(state, snap.source).await;
    let target = name_or_id(state, snap.target).await;
    let range = match snap.range {
        Some(RangeStatus { low, high, cursor }) => {
            format!("{}–{} (next: {})", low.0, high.0, cursor.0)
        }
        None => "Not set".to_string(),
    };

    let text = format!(
        "🔧 Bot Status\n• Source: {source}\n• Target: {target}\n• Range: {range}\n• Keyword: {}",
        snap.keyword
    );
    notify(state, chat, &text).await;
}

/// Best-effort chat label for `/status`; falls back to the bare id.
async fn name_or_id(state: &AppState, chat: Option<ChatId>) -> String {
    let Some(chat) = chat else {
        return "Not set".to_string();
    };
    match state.chats.resolve_chat(&chat.0.to_string()).await {
        Ok(profile) => match profile.title {
            Some(title) => format!("{title} ({})", chat.0),
            None => chat.0.to_string(),
        },
        Err(_) => chat.0.to_string(),
    }
}
