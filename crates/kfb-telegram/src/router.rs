use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use kfb_core::{config::Config, ports::ChatPort, relay::Relay, replies::ReplyTable};

use crate::handlers;
use crate::TelegramChats;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub relay: Arc<Relay>,
    pub chats: Arc<dyn ChatPort>,
    pub replies: Arc<ReplyTable>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("keyword forward bot started: @{}", me.username());
    }

    let replies = match &cfg.custom_replies_file {
        Some(path) => {
            let table = ReplyTable::load(path).map_err(|e| {
                anyhow::anyhow!("failed to load custom replies from {}: {e}", path.display())
            })?;
            info!("loaded {} custom replies", table.len());
            table
        }
        None => ReplyTable::default(),
    };

    let chats: Arc<dyn ChatPort> = Arc::new(TelegramChats::new(bot.clone()));
    let relay = Arc::new(Relay::new(&cfg.default_keyword));

    let state = Arc::new(AppState {
        cfg,
        relay,
        chats,
        replies: Arc::new(replies),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
