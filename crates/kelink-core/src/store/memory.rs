use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::{
    clock::{secs_i64, Clock},
    domain::{ChatId, MessageId, MessageRef, UserId},
    store::{keys, ModerationStore},
    Result,
};

#[derive(Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Option<i64>,
}

impl<T> Expiring<T> {
    fn live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |t| now < t)
    }
}

#[derive(Debug, Default)]
struct State {
    counters: HashMap<String, Expiring<u32>>,
    interacted: HashMap<String, Expiring<HashSet<UserId>>>,
    posters: HashMap<String, Expiring<UserId>>,
    recent: Option<Expiring<BTreeSet<(i64, MessageRef)>>>,
    grace_deadline: Option<i64>,
}

/// In-process [`ModerationStore`] with the same TTL semantics as the Redis backend.
///
/// Expiry is evaluated lazily against the injected clock.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(State::default()),
        }
    }

    fn expiry(&self, ttl: Duration) -> Option<i64> {
        Some(self.clock.unix_now().saturating_add(secs_i64(ttl)))
    }
}

#[async_trait]
impl ModerationStore for MemoryStore {
    async fn daily_count(&self, day: NaiveDate, user: UserId) -> Result<u32> {
        let now = self.clock.unix_now();
        let st = self.state.lock().await;
        Ok(st
            .counters
            .get(&keys::daily_count(day, user))
            .filter(|e| e.live(now))
            .map_or(0, |e| e.value))
    }

    async fn bump_daily_count(&self, day: NaiveDate, user: UserId, ttl: Duration) -> Result<u32> {
        let now = self.clock.unix_now();
        let expires_at = self.expiry(ttl);
        let mut st = self.state.lock().await;
        let entry = st
            .counters
            .entry(keys::daily_count(day, user))
            .or_insert(Expiring {
                value: 0,
                expires_at,
            });
        if !entry.live(now) {
            entry.value = 0;
        }
        entry.value += 1;
        entry.expires_at = expires_at;
        Ok(entry.value)
    }

    async fn release_daily_count(&self, day: NaiveDate, user: UserId) -> Result<()> {
        let now = self.clock.unix_now();
        let mut st = self.state.lock().await;
        if let Some(entry) = st
            .counters
            .get_mut(&keys::daily_count(day, user))
            .filter(|e| e.live(now))
        {
            entry.value = entry.value.saturating_sub(1);
        }
        Ok(())
    }

    async fn mark_interaction(&self, post: MessageRef, user: UserId, ttl: Duration) -> Result<()> {
        let now = self.clock.unix_now();
        let expires_at = self.expiry(ttl);
        let mut st = self.state.lock().await;
        let entry = st
            .interacted
            .entry(keys::interacted(post))
            .or_insert_with(|| Expiring {
                value: HashSet::new(),
                expires_at,
            });
        if !entry.live(now) {
            entry.value.clear();
        }
        entry.value.insert(user);
        entry.expires_at = expires_at;
        Ok(())
    }

    async fn has_interacted(&self, post: MessageRef, user: UserId) -> Result<bool> {
        let now = self.clock.unix_now();
        let st = self.state.lock().await;
        Ok(st
            .interacted
            .get(&keys::interacted(post))
            .filter(|e| e.live(now))
            .is_some_and(|e| e.value.contains(&user)))
    }

    async fn poster_of(&self, post: MessageRef) -> Result<Option<UserId>> {
        let now = self.clock.unix_now();
        let st = self.state.lock().await;
        Ok(st
            .posters
            .get(&keys::poster(post))
            .filter(|e| e.live(now))
            .map(|e| e.value))
    }

    async fn record_post(
        &self,
        post: MessageRef,
        poster: UserId,
        posted_at: i64,
        ttl: Duration,
    ) -> Result<()> {
        let now = self.clock.unix_now();
        let expires_at = self.expiry(ttl);
        let cutoff = posted_at.saturating_sub(secs_i64(ttl));
        let mut st = self.state.lock().await;

        st.posters.insert(
            keys::poster(post),
            Expiring {
                value: poster,
                expires_at,
            },
        );

        let recent = st.recent.get_or_insert_with(|| Expiring {
            value: BTreeSet::new(),
            expires_at,
        });
        if !recent.live(now) {
            recent.value.clear();
        }
        recent.value.retain(|(_, id)| *id != post);
        recent.value.insert((posted_at, post));
        recent.value.retain(|(ts, _)| *ts >= cutoff);
        recent.expires_at = expires_at;
        Ok(())
    }

    async fn posts_between(&self, chat: ChatId, from: i64, to: i64) -> Result<Vec<MessageId>> {
        let now = self.clock.unix_now();
        let st = self.state.lock().await;
        let Some(recent) = st.recent.as_ref().filter(|e| e.live(now)) else {
            return Ok(Vec::new());
        };
        Ok(recent
            .value
            .iter()
            .filter(|(ts, post)| post.chat_id == chat && *ts >= from && *ts <= to)
            .map(|(_, post)| post.message_id)
            .collect())
    }

    async fn grace_deadline(&self) -> Result<Option<i64>> {
        Ok(self.state.lock().await.grace_deadline)
    }

    async fn init_grace_deadline(&self, deadline: i64) -> Result<bool> {
        let mut st = self.state.lock().await;
        if st.grace_deadline.is_some() {
            return Ok(false);
        }
        st.grace_deadline = Some(deadline);
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn setup() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap(),
        ));
        let store = MemoryStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn counters_expire() {
        let (clock, store) = setup();
        let day = clock.now().date_naive();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.bump_daily_count(day, UserId(1), ttl).await.unwrap(), 1);
        assert_eq!(store.bump_daily_count(day, UserId(1), ttl).await.unwrap(), 2);
        assert_eq!(store.daily_count(day, UserId(1)).await.unwrap(), 2);

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(store.daily_count(day, UserId(1)).await.unwrap(), 0);
        assert_eq!(store.bump_daily_count(day, UserId(1), ttl).await.unwrap(), 1);
    }

    fn card(chat: i64, id: i32) -> MessageRef {
        MessageRef {
            chat_id: ChatId(chat),
            message_id: MessageId(id),
        }
    }

    #[tokio::test]
    async fn released_count_never_goes_negative() {
        let (clock, store) = setup();
        let day = clock.now().date_naive();
        let ttl = Duration::from_secs(60);

        store.bump_daily_count(day, UserId(1), ttl).await.unwrap();
        store.release_daily_count(day, UserId(1)).await.unwrap();
        assert_eq!(store.daily_count(day, UserId(1)).await.unwrap(), 0);

        store.release_daily_count(day, UserId(1)).await.unwrap();
        store.release_daily_count(day, UserId(2)).await.unwrap();
        assert_eq!(store.daily_count(day, UserId(1)).await.unwrap(), 0);
        assert_eq!(store.daily_count(day, UserId(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recent_posts_are_trimmed_and_ranged() {
        let (clock, store) = setup();
        let ttl = Duration::from_secs(100);
        let t0 = clock.unix_now();

        store.record_post(card(-1, 1), UserId(1), t0, ttl).await.unwrap();
        store
            .record_post(card(-1, 2), UserId(2), t0 + 50, ttl)
            .await
            .unwrap();
        store
            .record_post(card(-1, 3), UserId(3), t0 + 150, ttl)
            .await
            .unwrap();

        // post 1 fell out of the window when post 3 was recorded
        let ids = store.posts_between(ChatId(-1), t0 - 1000, t0 + 1000).await.unwrap();
        assert_eq!(ids, vec![MessageId(2), MessageId(3)]);

        let ids = store.posts_between(ChatId(-1), t0 + 100, t0 + 200).await.unwrap();
        assert_eq!(ids, vec![MessageId(3)]);
        assert_eq!(
            store.poster_of(card(-1, 2)).await.unwrap(),
            Some(UserId(2))
        );
    }

    #[tokio::test]
    async fn cards_are_scoped_by_chat() {
        let (clock, store) = setup();
        let ttl = Duration::from_secs(100);
        let t0 = clock.unix_now();

        store.record_post(card(-1, 7), UserId(1), t0, ttl).await.unwrap();
        store.record_post(card(-2, 7), UserId(2), t0, ttl).await.unwrap();
        store.mark_interaction(card(-2, 7), UserId(3), ttl).await.unwrap();

        assert_eq!(
            store.posts_between(ChatId(-1), t0, t0).await.unwrap(),
            vec![MessageId(7)]
        );
        assert!(store.posts_between(ChatId(-3), t0, t0).await.unwrap().is_empty());
        assert_eq!(store.poster_of(card(-1, 7)).await.unwrap(), Some(UserId(1)));
        assert_eq!(store.poster_of(card(-2, 7)).await.unwrap(), Some(UserId(2)));
        assert!(store.has_interacted(card(-2, 7), UserId(3)).await.unwrap());
        assert!(!store.has_interacted(card(-1, 7), UserId(3)).await.unwrap());
    }

    #[tokio::test]
    async fn grace_deadline_is_set_once() {
        let (_clock, store) = setup();
        assert!(store.init_grace_deadline(100).await.unwrap());
        assert!(!store.init_grace_deadline(200).await.unwrap());
        assert_eq!(store.grace_deadline().await.unwrap(), Some(100));
    }
}
