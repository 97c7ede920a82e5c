//! Redis adapter (redis-rs, tokio connection manager).
//!
//! This crate implements the `kelink-core` ModerationStore over Redis. Key names come
//! from `kelink_core::store::keys` so data written by earlier deployments stays valid.

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use tokio::time::sleep;

use kelink_core::{
    clock::secs_i64,
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    store::{keys, ModerationStore},
    Result,
};

/// DECR that stops at zero and never creates the key.
fn release_script() -> &'static Script {
    static SCRIPT: OnceLock<Script> = OnceLock::new();
    SCRIPT.get_or_init(|| {
        Script::new(
            r"
            local v = tonumber(redis.call('GET', KEYS[1]) or '0')
            if v > 0 then
                return redis.call('DECR', KEYS[1])
            end
            return 0
            ",
        )
    })
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and wait until Redis answers `PING`.
    ///
    /// Container start ordering does not guarantee the server is accepting
    /// connections yet, so failed attempts are retried with a fixed delay.
    pub async fn connect(url: &str, attempts: u32, delay: Duration) -> Result<Self> {
        let client = Client::open(url).map_err(map_err)?;
        let attempts = attempts.max(1);

        let mut last_err = None;
        for attempt in 1..=attempts {
            match Self::try_connect(&client).await {
                Ok(store) => {
                    tracing::info!(attempt, "connected to redis");
                    return Ok(store);
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, "redis not ready: {e}");
                    last_err = Some(e);
                    if attempt < attempts {
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Store("redis connection failed".to_string())))
    }

    async fn try_connect(client: &Client) -> Result<Self> {
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(map_err)?;
        let store = Self { conn };
        store.ping().await?;
        Ok(store)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn map_err(e: redis::RedisError) -> Error {
    Error::Store(format!("redis error: {e}"))
}

/// TTL in whole seconds; Redis treats 0 as "delete now".
fn ttl_secs(ttl: Duration) -> i64 {
    secs_i64(ttl).max(1)
}

/// Exclusive upper bound for trimming, so entries scored exactly at `cutoff` survive.
fn trim_bound(cutoff: i64) -> String {
    format!("({cutoff}")
}

#[async_trait]
impl ModerationStore for RedisStore {
    async fn daily_count(&self, day: NaiveDate, user: UserId) -> Result<u32> {
        let mut conn = self.conn();
        let v: Option<u32> = conn
            .get(keys::daily_count(day, user))
            .await
            .map_err(map_err)?;
        Ok(v.unwrap_or(0))
    }

    async fn bump_daily_count(&self, day: NaiveDate, user: UserId, ttl: Duration) -> Result<u32> {
        let key = keys::daily_count(day, user);
        let mut conn = self.conn();
        let (count,): (u32,) = redis::pipe()
            .atomic()
            .incr(&key, 1u32)
            .expire(&key, ttl_secs(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(count)
    }

    async fn release_daily_count(&self, day: NaiveDate, user: UserId) -> Result<()> {
        let mut conn = self.conn();
        let _: i64 = release_script()
            .key(keys::daily_count(day, user))
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn mark_interaction(&self, post: MessageRef, user: UserId, ttl: Duration) -> Result<()> {
        let key = keys::interacted(post);
        let mut conn = self.conn();
        let () = redis::pipe()
            .atomic()
            .sadd(&key, user.0)
            .ignore()
            .expire(&key, ttl_secs(ttl))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn has_interacted(&self, post: MessageRef, user: UserId) -> Result<bool> {
        let mut conn = self.conn();
        conn.sismember(keys::interacted(post), user.0)
            .await
            .map_err(map_err)
    }

    async fn poster_of(&self, post: MessageRef) -> Result<Option<UserId>> {
        let mut conn = self.conn();
        let v: Option<i64> = conn.get(keys::poster(post)).await.map_err(map_err)?;
        Ok(v.map(UserId))
    }

    async fn record_post(
        &self,
        post: MessageRef,
        poster: UserId,
        posted_at: i64,
        ttl: Duration,
    ) -> Result<()> {
        let secs = ttl_secs(ttl);
        let cutoff = posted_at.saturating_sub(secs_i64(ttl));
        let mut conn = self.conn();
        let () = redis::pipe()
            .atomic()
            .set_ex(keys::poster(post), poster.0, secs as u64)
            .ignore()
            .zadd(keys::RECENT_POSTS, keys::recent_member(post), posted_at)
            .ignore()
            .zrembyscore(keys::RECENT_POSTS, "-inf", trim_bound(cutoff))
            .ignore()
            .expire(keys::RECENT_POSTS, secs)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn posts_between(&self, chat: ChatId, from: i64, to: i64) -> Result<Vec<MessageId>> {
        let mut conn = self.conn();
        let members: Vec<String> = conn
            .zrangebyscore(keys::RECENT_POSTS, from, to)
            .await
            .map_err(map_err)?;
        Ok(members
            .iter()
            .filter_map(|m| keys::parse_recent_member(m))
            .filter(|post| post.chat_id == chat)
            .map(|post| post.message_id)
            .collect())
    }

    async fn grace_deadline(&self) -> Result<Option<i64>> {
        let mut conn = self.conn();
        conn.get(keys::GRACE_DEADLINE).await.map_err(map_err)
    }

    async fn init_grace_deadline(&self, deadline: i64) -> Result<bool> {
        let mut conn = self.conn();
        conn.set_nx(keys::GRACE_DEADLINE, deadline)
            .await
            .map_err(map_err)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        if pong != "PONG" {
            return Err(Error::Store(format!("unexpected PING reply: {pong}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_never_zero() {
        assert_eq!(ttl_secs(Duration::ZERO), 1);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(43_200)), 43_200);
        assert_eq!(ttl_secs(Duration::from_secs(u64::MAX)), i64::MAX);
    }

    #[test]
    fn trim_bound_is_exclusive() {
        assert_eq!(trim_bound(1_700_000_000), "(1700000000");
        assert_eq!(trim_bound(-5), "(-5");
    }

    #[tokio::test]
    async fn invalid_url_is_a_store_error() {
        let err = RedisStore::connect("not a url", 1, Duration::ZERO)
            .await
            .err()
            .expect("invalid url");
        assert!(matches!(err, Error::Store(_)));
    }
}
