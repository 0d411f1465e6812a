use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, warn};

use kfb_core::domain::ChatId;

use crate::router::AppState;

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let origin = ChatId(msg.chat.id.0);

    // Custom auto-replies run independently of the forwarding path.
    if let Some(response) = state.replies.lookup(text) {
        if let Err(e) = state.chats.send_notice(origin, response).await {
            warn!("custom reply to chat {} failed: {e}", origin.0);
        }
    }

    if let Some(outcome) = state
        .relay
        .on_trigger_text(origin, text, state.chats.as_ref())
        .await
    {
        debug!("trigger in chat {}: {outcome:?}", origin.0);
    }

    Ok(())
}
