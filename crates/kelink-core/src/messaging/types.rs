use url::Url;

use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// A group message that may carry a link.
#[derive(Clone, Debug)]
pub struct LinkMessage {
    pub msg: MessageRef,
    pub user_id: UserId,
    pub display_name: String,
    pub text: String,
}

/// A reply to some earlier message.
#[derive(Clone, Debug)]
pub struct ReplyMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub replied_to: MessageId,
}

/// A user changed their reaction on a message.
#[derive(Clone, Debug)]
pub struct ReactionUpdate {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlButton {
    pub label: String,
    pub url: Url,
}

impl UrlButton {
    pub fn new(label: impl Into<String>, url: Url) -> Self {
        Self {
            label: label.into(),
            url,
        }
    }
}
