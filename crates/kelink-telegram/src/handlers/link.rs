use std::sync::Arc;

use teloxide::{prelude::*, types::User};

use kelink_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::LinkMessage,
    moderation::LinkOutcome,
};

use crate::handlers::user_id;
use crate::router::AppState;

pub async fn handle_link(
    msg: &Message,
    user: &User,
    text: String,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let link = LinkMessage {
        msg: MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        },
        user_id: user_id(user),
        display_name: user.full_name(),
        text,
    };

    // Check → bump → post must not interleave for one user across chats.
    let _guard = state.user_locks.lock_user(link.user_id.0).await;

    match state
        .moderator
        .handle_link(&link, state.messenger.as_ref())
        .await
    {
        Ok(LinkOutcome::Ignored) => {}
        Ok(outcome) => {
            tracing::debug!(chat = link.msg.chat_id.0, ?outcome, "link handled");
        }
        Err(e) => {
            tracing::error!(
                chat = link.msg.chat_id.0,
                user = %link.user_id,
                "link moderation failed: {e}"
            );
            state
                .moderator
                .record_error(Some(link.user_id), &e.to_string(), "link");
        }
    }

    Ok(())
}
