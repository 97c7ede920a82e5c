use teloxide::{prelude::*, types::User};

use kelink_core::{domain::ChatId, formatting::status_html};

use crate::handlers::user_id;
use crate::router::AppState;

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

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Status,
}

/// Known command in `text`, if any. Unknown `/words` return `None` so the message
/// still goes through link moderation.
pub(crate) fn parse(text: &str) -> Option<Command> {
    if !text.starts_with('/') {
        return None;
    }
    let (cmd, _args) = parse_command(text);
    match cmd.as_str() {
        "status" | "start" => Some(Command::Status),
        _ => None,
    }
}

/// Reply with the user's usage and the cards they still owe in this chat.
pub async fn handle_status(msg: &Message, user: &User, state: &AppState) -> ResponseResult<()> {
    let chat_id = ChatId(msg.chat.id.0);
    let html = match state.moderator.status(chat_id, user_id(user)).await {
        Ok(st) => status_html(st.used_today, st.limit, st.pending.len(), st.grace_until),
        Err(e) => {
            tracing::error!(chat = chat_id.0, "status lookup failed: {e}");
            "⚠️ Status is unavailable right now. Try again later.".to_string()
        }
    };
    if let Err(e) = state.messenger.send_html(chat_id, &html).await {
        tracing::warn!(chat = chat_id.0, "failed to send status: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/Status@KeLinkBot  now please"),
            ("status".to_string(), "now please".to_string())
        );
        assert_eq!(parse_command("/start"), ("start".to_string(), String::new()));
    }

    #[test]
    fn only_status_and_start_are_known() {
        assert_eq!(parse("/status"), Some(Command::Status));
        assert_eq!(parse("/START@KeLinkBot"), Some(Command::Status));
        assert_eq!(parse("/share https://example.com"), None);
        assert_eq!(parse("status"), None);
    }

    #[test]
    fn non_commands_parse_to_their_first_word() {
        let (cmd, rest) = parse_command("/share https://example.com");
        assert_eq!(cmd, "share");
        assert_eq!(rest, "https://example.com");
    }
}
