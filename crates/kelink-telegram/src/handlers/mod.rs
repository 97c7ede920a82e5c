//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - filters chats that are not moderated
//! - maps the teloxide update onto a `kelink-core` message type
//! - calls into the `Moderator` and logs (never propagates) its failures

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Message, MessageReactionUpdated, User},
};

use kelink_core::{
    domain::{ChatId, MessageId, UserId},
    messaging::types::{ReactionUpdate, ReplyMessage},
};

use crate::router::AppState;

mod commands;
mod link;

pub(crate) fn user_id(user: &User) -> UserId {
    UserId(user.id.0 as i64)
}

/// What to do with an incoming message. The first matching rule wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Route<'a> {
    /// Chat is not moderated.
    Skip,
    Status,
    /// Replies are interactions, even when they contain a link.
    Reply,
    /// Text or caption that goes through link moderation.
    Link(&'a str),
    /// Nothing to moderate (stickers, service messages, ...).
    Ignore,
}

pub(crate) fn route<'a>(
    chat_allowed: bool,
    text: Option<&'a str>,
    caption: Option<&'a str>,
    is_reply: bool,
) -> Route<'a> {
    if !chat_allowed {
        return Route::Skip;
    }
    if text.and_then(commands::parse).is_some() {
        return Route::Status;
    }
    if is_reply {
        return Route::Reply;
    }
    match text.or(caption) {
        Some(body) => Route::Link(body),
        None => Route::Ignore,
    }
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    let parent = msg.reply_to_message().map(|p| MessageId(p.id.0));
    match route(
        state.cfg.is_chat_allowed(msg.chat.id.0),
        msg.text(),
        msg.caption(),
        parent.is_some(),
    ) {
        Route::Skip | Route::Ignore => Ok(()),
        Route::Status => commands::handle_status(&msg, &user, &state).await,
        Route::Reply => {
            let Some(replied_to) = parent else {
                return Ok(());
            };
            let reply = ReplyMessage {
                chat_id: ChatId(msg.chat.id.0),
                user_id: user_id(&user),
                replied_to,
            };
            if let Err(e) = state.moderator.handle_reply(&reply).await {
                tracing::error!(chat = msg.chat.id.0, "failed to record reply: {e}");
                state
                    .moderator
                    .record_error(Some(reply.user_id), &e.to_string(), "reply");
            }
            Ok(())
        }
        Route::Link(body) => {
            let body = body.to_string();
            link::handle_link(&msg, &user, body, state).await
        }
    }
}

pub async fn handle_reaction(
    reaction: MessageReactionUpdated,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if !state.cfg.is_chat_allowed(reaction.chat.id.0) {
        return Ok(());
    }
    // Anonymous (channel / admin-as-group) reactions carry no user to credit.
    let Some(user) = reaction.user.as_ref() else {
        return Ok(());
    };

    let update = ReactionUpdate {
        chat_id: ChatId(reaction.chat.id.0),
        message_id: MessageId(reaction.message_id.0),
        user_id: user_id(user),
    };
    if let Err(e) = state.moderator.handle_reaction(&update).await {
        tracing::error!(chat = update.chat_id.0, "failed to record reaction: {e}");
        state
            .moderator
            .record_error(Some(update.user_id), &e.to_string(), "reaction");
    }
    Ok(())
}
