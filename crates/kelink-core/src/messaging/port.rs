use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::UrlButton,
    Result,
};

/// Outbound messaging port used by the moderation core.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Send an HTML message carrying a single inline URL button.
    async fn send_url_button(
        &self,
        chat_id: ChatId,
        html: &str,
        button: UrlButton,
    ) -> Result<MessageRef>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;
}
