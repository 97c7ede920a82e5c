use crate::{errors::Error, Result};

/// Initialize tracing for a KeLink binary.
///
/// Writes to stdout without buffering so container logs show up immediately.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(default_directives(service_name))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::External(format!("failed to install tracing subscriber: {e}")))
}

fn default_directives(service_name: &str) -> String {
    let service = service_name.replace('-', "_");
    format!(
        "warn,kelink=info,kelink_core=info,kelink_redis=info,kelink_telegram=info,{service}=info"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_normalize_binary_name() {
        let d = default_directives("kelink-check-token");
        assert!(d.starts_with("warn,"));
        assert!(d.ends_with("kelink_check_token=info"));
    }
}
