use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio_util::sync::CancellationToken;
use tracing::info;

use wtb_core::{
    config::Config, poll::Poller, ports::WeiboFeed, registry::FollowRegistry,
};

use crate::{commands, TelegramGroupMessenger};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub registry: FollowRegistry,
    pub feed: Arc<dyn WeiboFeed>,
}

/// Runs the bot: starts the fixed-interval poller and then long-polls
/// Telegram for commands until the dispatcher exits.
pub async fn run_polling(
    cfg: Arc<Config>,
    registry: FollowRegistry,
    feed: Arc<dyn WeiboFeed>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(username = me.username(), "bot started");
    }
    info!(data_dir = %cfg.data_dir.display(), interval = ?cfg.poll_interval, "poller configured");

    let messenger = Arc::new(TelegramGroupMessenger::new(bot.clone()));
    let poller = Arc::new(Poller::new(registry.clone(), feed.clone(), messenger));

    let cancel = CancellationToken::new();
    let poll_task = tokio::spawn(poller.run_interval(cfg.poll_interval, cancel.clone()));

    let state = Arc::new(AppState {
        cfg,
        registry,
        feed,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    cancel.cancel();
    let _ = poll_task.await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // This bot only reacts to commands; all other traffic is ignored.
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }
    commands::handle_command(bot, msg, state).await
}
