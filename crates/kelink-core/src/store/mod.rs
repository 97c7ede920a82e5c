//! Persistence port for moderation state.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    Result,
};

/// Storage operations the moderation rules depend on.
///
/// Times are unix seconds. TTLs are applied by the store; callers never delete keys.
/// Cards are addressed by [`MessageRef`] because message ids are only unique per chat.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    async fn daily_count(&self, day: NaiveDate, user: UserId) -> Result<u32>;

    /// Increment the user's count for `day` and (re)set its expiry in one step.
    async fn bump_daily_count(&self, day: NaiveDate, user: UserId, ttl: Duration) -> Result<u32>;

    /// Give back one unit of the user's count for `day`, never going below zero.
    async fn release_daily_count(&self, day: NaiveDate, user: UserId) -> Result<()>;

    async fn mark_interaction(&self, post: MessageRef, user: UserId, ttl: Duration) -> Result<()>;

    async fn has_interacted(&self, post: MessageRef, user: UserId) -> Result<bool>;

    async fn poster_of(&self, post: MessageRef) -> Result<Option<UserId>>;

    /// Remember a link card: who posted it and when. Entries older than
    /// `posted_at - ttl` are trimmed from the recent-posts index.
    async fn record_post(
        &self,
        post: MessageRef,
        poster: UserId,
        posted_at: i64,
        ttl: Duration,
    ) -> Result<()>;

    /// Card ids posted in `chat` within `[from, to]`, oldest first.
    async fn posts_between(&self, chat: ChatId, from: i64, to: i64) -> Result<Vec<MessageId>>;

    async fn grace_deadline(&self) -> Result<Option<i64>>;

    /// Store the grace deadline unless one already exists. Returns true if stored.
    async fn init_grace_deadline(&self, deadline: i64) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

/// Key names. Shared by every backend so persisted data stays readable after redeploys.
pub mod keys {
    use chrono::NaiveDate;

    use crate::domain::{ChatId, MessageId, MessageRef, UserId};

    pub const RECENT_POSTS: &str = "posts_last12h";
    pub const GRACE_DEADLINE: &str = "enforce_after";

    pub fn daily_count(day: NaiveDate, user: UserId) -> String {
        format!("cnt:{}:{}", day.format("%Y-%m-%d"), user.0)
    }

    pub fn interacted(post: MessageRef) -> String {
        format!("post:{}:{}:interacted", post.chat_id.0, post.message_id.0)
    }

    pub fn poster(post: MessageRef) -> String {
        format!("post:{}:{}:poster", post.chat_id.0, post.message_id.0)
    }

    /// Member of [`RECENT_POSTS`] for a card.
    pub fn recent_member(post: MessageRef) -> String {
        format!("{}:{}", post.chat_id.0, post.message_id.0)
    }

    /// Inverse of [`recent_member`]. Bare message ids written before cards were
    /// scoped by chat yield `None` and are skipped until they expire.
    pub fn parse_recent_member(member: &str) -> Option<MessageRef> {
        let (chat, msg) = member.rsplit_once(':')?;
        Some(MessageRef {
            chat_id: ChatId(chat.parse().ok()?),
            message_id: MessageId(msg.parse().ok()?),
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn key_layout() {
            let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
            assert_eq!(daily_count(day, UserId(99)), "cnt:2026-05-04:99");
            let card = MessageRef {
                chat_id: ChatId(-100),
                message_id: MessageId(12),
            };
            assert_eq!(interacted(card), "post:-100:12:interacted");
            assert_eq!(poster(card), "post:-100:12:poster");
            assert_eq!(recent_member(card), "-100:12");
        }

        #[test]
        fn recent_members_parse_back() {
            let card = MessageRef {
                chat_id: ChatId(-100_555),
                message_id: MessageId(7),
            };
            assert_eq!(parse_recent_member(&recent_member(card)), Some(card));
            assert_eq!(parse_recent_member("501"), None);
            assert_eq!(parse_recent_member("x:1"), None);
        }
    }
}
