//! Append-only audit trail of moderation decisions.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    domain::{ChatId, MessageId, UserId},
    errors::Error,
    Result,
};

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn base(event: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            user_id: None,
            chat_id: None,
            message_id: None,
            content: None,
            reason: None,
            count: None,
            error: None,
        }
    }

    /// Stamp the event with `when` instead of the wall clock.
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.timestamp = when.to_rfc3339();
        self
    }

    pub fn link_accepted(user: UserId, chat: ChatId, card: MessageId, url: &str, count: u32) -> Self {
        Self {
            user_id: Some(user.0),
            chat_id: Some(chat.0),
            message_id: Some(card.0),
            content: Some(url.to_string()),
            count: Some(count),
            ..Self::base("link_accepted")
        }
    }

    pub fn link_rejected(user: UserId, chat: ChatId, text: &str, reason: &str) -> Self {
        Self {
            user_id: Some(user.0),
            chat_id: Some(chat.0),
            content: Some(text.to_string()),
            reason: Some(reason.to_string()),
            ..Self::base("link_rejected")
        }
    }

    pub fn interaction(user: UserId, chat: ChatId, post: MessageId, kind: &str) -> Self {
        Self {
            user_id: Some(user.0),
            chat_id: Some(chat.0),
            message_id: Some(post.0),
            reason: Some(kind.to_string()),
            ..Self::base("interaction")
        }
    }

    pub fn error(user: Option<UserId>, error: &str, context: Option<&str>) -> Self {
        Self {
            user_id: user.map(|u| u.0),
            error: Some(error.to_string()),
            reason: context.map(|s| s.to_string()),
            ..Self::base("error")
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
        assert_eq!(truncate_text("short", AUDIT_MAX_TEXT), "short");
    }

    #[test]
    fn json_lines_are_truncated_and_appended() {
        let log = AuditLogger::new(tmp_file("kelink-audit-json"), true);
        let long = "x".repeat(AUDIT_MAX_TEXT + 1);
        log.write(AuditEvent::link_rejected(UserId(1), ChatId(-5), &long, "quota"))
            .unwrap();
        log.write(AuditEvent::interaction(UserId(2), ChatId(-5), MessageId(9), "reaction"))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "link_rejected");
        assert_eq!(first["reason"], "quota");
        assert!(first["content"].as_str().unwrap().ends_with("..."));
        assert!(first.get("count").is_none());

        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn plain_text_block() {
        let log = AuditLogger::new(tmp_file("kelink-audit-text"), false);
        log.write(AuditEvent::link_accepted(
            UserId(3),
            ChatId(-7),
            MessageId(11),
            "https://example.com",
            2,
        ))
        .unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: link_accepted"));
        assert!(written.contains("content: https://example.com"));
        assert!(written.contains("count: 2"));
        let _ = std::fs::remove_file(log.path());
    }
}
