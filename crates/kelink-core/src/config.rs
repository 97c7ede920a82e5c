use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, token, Result};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Upper bound for the interaction window and the grace period (30 days).
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 3600;

/// Typed configuration, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub redis_url: String,

    // Moderation rules
    pub daily_link_limit: u32,
    pub interaction_window: Duration,
    pub grace_period: Duration,
    pub allowed_chats: Vec<i64>,

    // Redis readiness
    pub redis_connect_attempts: u32,
    pub redis_retry_delay: Duration,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in production).
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let bot_token = get("BOT_TOKEN").ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;
        let report = token::inspect(&bot_token);
        if report.has_surrounding_whitespace {
            tracing::warn!("BOT_TOKEN has surrounding whitespace; it will be trimmed");
        }
        if !report.format_ok {
            tracing::warn!(
                token = %token::mask(&bot_token),
                "BOT_TOKEN does not look like a Bot API token"
            );
        }
        let bot_token = bot_token.trim().to_string();

        let redis_url = get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let daily_link_limit = parse_num::<u32>(get("DAILY_LINK_LIMIT")).unwrap_or(3).max(1);
        let interaction_window = Duration::from_secs(
            parse_num::<u64>(get("INTERACTION_WINDOW_SECS"))
                .unwrap_or(43_200)
                .clamp(1, MAX_WINDOW_SECS),
        );
        let grace_period = Duration::from_secs(
            parse_num::<u64>(get("GRACE_PERIOD_SECS"))
                .unwrap_or(43_200)
                .min(MAX_WINDOW_SECS),
        );
        let allowed_chats = parse_csv_i64(get("ALLOWED_CHATS"));

        let redis_connect_attempts =
            parse_num::<u32>(get("REDIS_CONNECT_ATTEMPTS")).unwrap_or(10).max(1);
        let redis_retry_delay =
            Duration::from_millis(parse_num::<u64>(get("REDIS_RETRY_DELAY_MS")).unwrap_or(1000));

        let audit_log_path = get("AUDIT_LOG_PATH").map(PathBuf::from);
        let audit_log_json = get("AUDIT_LOG_JSON").map(|s| parse_bool(&s)).unwrap_or(true);

        Ok(Self {
            bot_token,
            redis_url,
            daily_link_limit,
            interaction_window,
            grace_period,
            allowed_chats,
            redis_connect_attempts,
            redis_retry_delay,
            audit_log_path,
            audit_log_json,
        })
    }

    /// Empty allow-list means every chat is moderated.
    pub fn is_chat_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }
}

/// Minimal `.env` loader. Existing variables win, so values injected by the
/// container runtime are never overridden by the file.
pub fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue;
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
    v.and_then(|s| s.trim().parse::<T>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
