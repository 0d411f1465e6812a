//! Telegram update handlers.
//!
//! Every incoming message flows through `handle_message`: slash commands go
//! to the command handler, everything else with text goes to the custom-reply
//! lookup and the forward trigger detector.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(body) = msg.text() else {
        // Non-text updates carry no trigger and no command.
        return Ok(());
    };

    if body.starts_with('/') {
        return commands::handle_command(bot, msg, state).await;
    }

    text::handle_text(msg, state).await
}
