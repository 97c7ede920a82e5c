use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    types::AllowedUpdate, update_listeners::Polling,
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use kelink_core::{
    config::Config,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    moderation::Moderator,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub moderator: Arc<Moderator>,
    pub messenger: Arc<dyn MessagingPort>,
    pub user_locks: Arc<UserLocks>,
}

/// One async mutex per user id, created on first use.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Updates the bot subscribes to. Reactions are opt-in on the Bot API side.
fn allowed_updates() -> Vec<AllowedUpdate> {
    vec![AllowedUpdate::Message, AllowedUpdate::MessageReaction]
}

pub async fn run_polling(cfg: Arc<Config>, moderator: Arc<Moderator>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    let me = bot
        .get_me()
        .await
        .context("getMe failed; check BOT_TOKEN")?;
    tracing::info!(username = %me.username(), "kelink started");
    if cfg.allowed_chats.is_empty() {
        tracing::info!("moderating every chat the bot is in");
    } else {
        tracing::info!(chats = ?cfg.allowed_chats, "moderating allow-listed chats only");
    }

    // Throttle outbound calls so bursts of cards/deletions stay under flood limits.
    // The Telegram adapter still retries a single RetryAfter on its own.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState {
        cfg,
        moderator,
        messenger,
        user_locks: Arc::new(UserLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_message_reaction_updated().endpoint(handlers::handle_reaction))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    let listener = Polling::builder(bot.clone())
        .allowed_updates(allowed_updates())
        .build();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("error from the update listener"),
        )
        .await;

    tracing::info!("kelink stopped");
    Ok(())
}
