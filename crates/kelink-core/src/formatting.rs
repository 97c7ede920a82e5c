//! Telegram HTML snippets used by the moderation flow.

use crate::domain::UserId;

pub const OPEN_LINK_LABEL: &str = "Open link 🔗";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Inline mention that works whether or not the user has a public username.
pub fn mention_html(user_id: UserId, display_name: &str) -> String {
    let name = display_name.trim();
    let name = if name.is_empty() { "someone" } else { name };
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user_id.0,
        escape_html(name)
    )
}

pub fn link_card_html(mention: &str, count: u32, limit: u32) -> String {
    format!("🔗 {mention} shared a link ({count}/{limit} today)")
}

pub fn quota_notice_html(limit: u32) -> String {
    format!("🚫 You have already shared {limit} links today. Try again after 00:00 UTC.")
}

pub fn interaction_notice_html(window_hours: u64) -> String {
    format!(
        "👀 Before sharing, please react or reply to every link posted in the last {window_hours} hours."
    )
}

pub fn status_html(used: u32, limit: u32, pending: usize, grace_until: Option<i64>) -> String {
    let mut out = format!("📊 Links shared today: <b>{used}/{limit}</b>");
    match grace_until {
        Some(ts) => out.push_str(&format!(
            "\n⏳ Grace window active until <code>{}</code>",
            format_unix_utc(ts)
        )),
        None if pending == 0 => out.push_str("\n✅ You are all caught up."),
        None => out.push_str(&format!(
            "\n👀 Posts still waiting for your reaction or reply: <b>{pending}</b>"
        )),
    }
    out
}

fn format_unix_utc(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        assert_eq!(escape_html("<b>&\"</b>"), "&lt;b&gt;&amp;&quot;&lt;/b&gt;");
    }

    #[test]
    fn mention_escapes_name() {
        assert_eq!(
            mention_html(UserId(42), "Tom & <Jerry>"),
            "<a href=\"tg://user?id=42\">Tom &amp; &lt;Jerry&gt;</a>"
        );
        assert!(mention_html(UserId(7), "  ").contains(">someone</a>"));
    }

    #[test]
    fn card_and_notices() {
        assert_eq!(link_card_html("M", 2, 3), "🔗 M shared a link (2/3 today)");
        assert!(quota_notice_html(3).contains("already shared 3 links"));
        assert!(interaction_notice_html(12).contains("last 12 hours"));
    }

    #[test]
    fn status_variants() {
        assert!(status_html(1, 3, 0, Some(0)).contains("1970-01-01 00:00 UTC"));
        assert!(status_html(0, 3, 0, None).contains("caught up"));
        assert!(status_html(3, 3, 2, None).contains("<b>2</b>"));
    }
}
