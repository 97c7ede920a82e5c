//! Link moderation rules: daily quota, interaction rule, grace window.
//!
//! The [`Moderator`] owns the decision logic and drives the store and the messenger.
//! Adapters only translate platform updates into [`LinkMessage`], [`ReplyMessage`]
//! and [`ReactionUpdate`].

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;

use crate::{
    audit::{AuditEvent, AuditLogger},
    clock::{seconds_to_midnight, secs_i64, Clock},
    config::Config,
    domain::{ChatId, MessageId, MessageRef, UserId},
    formatting::{
        interaction_notice_html, link_card_html, mention_html, quota_notice_html, OPEN_LINK_LABEL,
    },
    links,
    messaging::{
        port::MessagingPort,
        types::{LinkMessage, ReactionUpdate, ReplyMessage, UrlButton},
    },
    store::ModerationStore,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkPolicy {
    pub daily_limit: u32,
    pub interaction_window: Duration,
    pub grace_period: Duration,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            daily_limit: 3,
            interaction_window: Duration::from_secs(12 * 3600),
            grace_period: Duration::from_secs(12 * 3600),
        }
    }
}

impl LinkPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            daily_limit: cfg.daily_link_limit,
            interaction_window: cfg.interaction_window,
            grace_period: cfg.grace_period,
        }
    }

    /// Window length in whole hours for user-facing text (rounded up, at least 1).
    pub fn window_hours(&self) -> u64 {
        self.interaction_window.as_secs().div_ceil(3600).max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkDecision {
    Accepted,
    QuotaExceeded { used: u32 },
    InteractionRequired { pending: Vec<MessageId> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Not a link share; the message is left alone.
    Ignored,
    RejectedQuota,
    RejectedInteraction { pending: Vec<MessageId> },
    Accepted { card: MessageRef, count: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserStatus {
    pub used_today: u32,
    pub limit: u32,
    pub pending: Vec<MessageId>,
    /// Set while the grace window is still running.
    pub grace_until: Option<i64>,
}

pub struct Moderator {
    store: Arc<dyn ModerationStore>,
    clock: Arc<dyn Clock>,
    policy: LinkPolicy,
    audit: Option<AuditLogger>,
}

impl Moderator {
    pub fn new(store: Arc<dyn ModerationStore>, clock: Arc<dyn Clock>, policy: LinkPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    fn audit(&self, event: AuditEvent) {
        let Some(log) = &self.audit else {
            return;
        };
        if let Err(e) = log.write(event.at(self.clock.now())) {
            tracing::warn!(path = %log.path().display(), "audit write failed: {e}");
        }
    }

    /// Start the grace window on first run. Returns the effective deadline.
    pub async fn ensure_grace_window(&self) -> Result<i64> {
        let deadline = self
            .clock
            .unix_now()
            .saturating_add(secs_i64(self.policy.grace_period));
        if self.store.init_grace_deadline(deadline).await? {
            tracing::info!(deadline, "grace window started");
            return Ok(deadline);
        }
        Ok(self.store.grace_deadline().await?.unwrap_or(deadline))
    }

    async fn grace_until(&self) -> Result<Option<i64>> {
        let now = self.clock.unix_now();
        // No stored deadline means the window was never started, which counts as grace.
        let deadline = self
            .store
            .grace_deadline()
            .await?
            .unwrap_or(now.saturating_add(secs_i64(self.policy.grace_period)));
        Ok((now < deadline).then_some(deadline))
    }

    pub async fn grace_active(&self) -> Result<bool> {
        Ok(self.grace_until().await?.is_some())
    }

    /// Cards from other users in `chat` during the current window that `user` has
    /// not reacted or replied to.
    pub async fn pending_posts(&self, chat: ChatId, user: UserId) -> Result<Vec<MessageId>> {
        if self.grace_active().await? {
            return Ok(Vec::new());
        }

        let now = self.clock.unix_now();
        let from = now.saturating_sub(secs_i64(self.policy.interaction_window));

        let mut pending = Vec::new();
        for id in self.store.posts_between(chat, from, now).await? {
            let post = MessageRef {
                chat_id: chat,
                message_id: id,
            };
            if self.store.poster_of(post).await? == Some(user) {
                continue;
            }
            if !self.store.has_interacted(post, user).await? {
                pending.push(id);
            }
        }
        Ok(pending)
    }

    pub async fn check_link(&self, chat: ChatId, user: UserId) -> Result<LinkDecision> {
        let used = self.store.daily_count(self.today(), user).await?;
        if used >= self.policy.daily_limit {
            return Ok(LinkDecision::QuotaExceeded { used });
        }

        let pending = self.pending_posts(chat, user).await?;
        if !pending.is_empty() {
            return Ok(LinkDecision::InteractionRequired { pending });
        }

        Ok(LinkDecision::Accepted)
    }

    pub async fn handle_link(
        &self,
        link: &LinkMessage,
        messenger: &dyn MessagingPort,
    ) -> Result<LinkOutcome> {
        if !links::contains_link(&link.text) {
            return Ok(LinkOutcome::Ignored);
        }
        let Some(url) = links::extract_url(&link.text) else {
            tracing::debug!(
                user = %link.user_id,
                "message mentions a scheme but has no usable URL; leaving it"
            );
            return Ok(LinkOutcome::Ignored);
        };

        match self.check_link(link.msg.chat_id, link.user_id).await? {
            LinkDecision::QuotaExceeded { used } => self.reject_quota(link, messenger, used).await,
            LinkDecision::InteractionRequired { pending } => {
                tracing::info!(
                    user = %link.user_id,
                    pending = pending.len(),
                    "link rejected: interaction rule"
                );
                self.reject(
                    link,
                    messenger,
                    &interaction_notice_html(self.policy.window_hours()),
                )
                .await;
                self.audit(AuditEvent::link_rejected(
                    link.user_id,
                    link.msg.chat_id,
                    &link.text,
                    "interaction_required",
                ));
                Ok(LinkOutcome::RejectedInteraction { pending })
            }
            LinkDecision::Accepted => self.accept(link, url, messenger).await,
        }
    }

    async fn reject_quota(
        &self,
        link: &LinkMessage,
        messenger: &dyn MessagingPort,
        used: u32,
    ) -> Result<LinkOutcome> {
        tracing::info!(user = %link.user_id, used, "link rejected: daily quota");
        self.reject(link, messenger, &quota_notice_html(self.policy.daily_limit))
            .await;
        self.audit(AuditEvent::link_rejected(
            link.user_id,
            link.msg.chat_id,
            &link.text,
            "daily_quota",
        ));
        Ok(LinkOutcome::RejectedQuota)
    }

    async fn reject(&self, link: &LinkMessage, messenger: &dyn MessagingPort, notice: &str) {
        if let Err(e) = messenger.delete_message(link.msg).await {
            tracing::warn!(chat = link.msg.chat_id.0, "failed to delete rejected link: {e}");
        }
        // Users who never opened a private chat with the bot cannot be messaged.
        if let Err(e) = messenger
            .send_html(ChatId::from(link.user_id), notice)
            .await
        {
            tracing::warn!(user = %link.user_id, "failed to send notice: {e}");
        }
    }

    async fn accept(
        &self,
        link: &LinkMessage,
        url: url::Url,
        messenger: &dyn MessagingPort,
    ) -> Result<LinkOutcome> {
        let now = self.clock.now();
        let day = now.date_naive();

        // Reserve the slot before posting; released again if the card cannot be sent.
        let count = self
            .store
            .bump_daily_count(
                day,
                link.user_id,
                Duration::from_secs(seconds_to_midnight(now)),
            )
            .await?;
        if count > self.policy.daily_limit {
            self.release_slot(day, link.user_id).await;
            return self.reject_quota(link, messenger, count - 1).await;
        }

        let html = link_card_html(
            &mention_html(link.user_id, &link.display_name),
            count,
            self.policy.daily_limit,
        );
        let card = match messenger
            .send_url_button(
                link.msg.chat_id,
                &html,
                UrlButton::new(OPEN_LINK_LABEL, url.clone()),
            )
            .await
        {
            Ok(card) => card,
            Err(e) => {
                self.release_slot(day, link.user_id).await;
                return Err(e);
            }
        };

        if let Err(e) = messenger.delete_message(link.msg).await {
            tracing::warn!(chat = link.msg.chat_id.0, "failed to delete original link: {e}");
        }

        if let Err(e) = self.track_card(card, link.user_id, now.timestamp()).await {
            tracing::error!(
                user = %link.user_id,
                chat = card.chat_id.0,
                card = %card.message_id,
                "card posted but not recorded; it will not count for the interaction rule: {e}"
            );
            return Err(e);
        }

        tracing::info!(
            user = %link.user_id,
            card = %card.message_id,
            count,
            "link accepted"
        );
        self.audit(AuditEvent::link_accepted(
            link.user_id,
            link.msg.chat_id,
            card.message_id,
            url.as_str(),
            count,
        ));

        Ok(LinkOutcome::Accepted { card, count })
    }

    async fn release_slot(&self, day: NaiveDate, user: UserId) {
        if let Err(e) = self.store.release_daily_count(day, user).await {
            tracing::error!(user = %user, "failed to release reserved daily slot: {e}");
        }
    }

    async fn track_card(&self, card: MessageRef, poster: UserId, posted_at: i64) -> Result<()> {
        let window = self.policy.interaction_window;
        self.store
            .record_post(card, poster, posted_at, window)
            .await?;
        // The poster counts as having interacted with their own card.
        self.store.mark_interaction(card, poster, window).await
    }

    pub async fn handle_reply(&self, reply: &ReplyMessage) -> Result<()> {
        self.record_interaction(reply.chat_id, reply.replied_to, reply.user_id, "reply")
            .await
    }

    pub async fn handle_reaction(&self, reaction: &ReactionUpdate) -> Result<()> {
        self.record_interaction(
            reaction.chat_id,
            reaction.message_id,
            reaction.user_id,
            "reaction",
        )
        .await
    }

    async fn record_interaction(
        &self,
        chat: ChatId,
        post: MessageId,
        user: UserId,
        kind: &str,
    ) -> Result<()> {
        let card = MessageRef {
            chat_id: chat,
            message_id: post,
        };
        self.store
            .mark_interaction(card, user, self.policy.interaction_window)
            .await?;
        tracing::debug!(user = %user, post = %post, kind, "interaction recorded");
        self.audit(AuditEvent::interaction(user, chat, post, kind));
        Ok(())
    }

    /// Usage and pending cards for `user` as seen from `chat`.
    pub async fn status(&self, chat: ChatId, user: UserId) -> Result<UserStatus> {
        Ok(UserStatus {
            used_today: self.store.daily_count(self.today(), user).await?,
            limit: self.policy.daily_limit,
            pending: self.pending_posts(chat, user).await?,
            grace_until: self.grace_until().await?,
        })
    }

    pub fn record_error(&self, user: Option<UserId>, error: &str, context: &str) {
        self.audit(AuditEvent::error(user, error, Some(context)));
    }
}
