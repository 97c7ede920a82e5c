use std::sync::Arc;

use anyhow::Context;

use kelink_core::{
    audit::AuditLogger,
    clock::SystemClock,
    config::Config,
    moderation::{LinkPolicy, Moderator},
};
use kelink_redis::RedisStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kelink_core::logging::init("kelink")?;

    let cfg = Arc::new(Config::load()?);

    let store = RedisStore::connect(
        &cfg.redis_url,
        cfg.redis_connect_attempts,
        cfg.redis_retry_delay,
    )
    .await
    .context("redis is not reachable")?;

    let mut moderator = Moderator::new(
        Arc::new(store),
        Arc::new(SystemClock),
        LinkPolicy::from_config(&cfg),
    );
    if let Some(path) = &cfg.audit_log_path {
        tracing::info!(path = %path.display(), "audit log enabled");
        moderator = moderator.with_audit(AuditLogger::new(path.clone(), cfg.audit_log_json));
    }

    let deadline = moderator.ensure_grace_window().await?;
    tracing::info!(
        enforce_after = deadline,
        daily_limit = cfg.daily_link_limit,
        window_secs = cfg.interaction_window.as_secs(),
        "moderation rules loaded"
    );

    kelink_telegram::router::run_polling(cfg, Arc::new(moderator))
        .await
        .context("telegram bot failed")?;

    Ok(())
}
