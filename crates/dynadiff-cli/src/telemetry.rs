use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// Installs the global log subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Logs go to stderr so that
/// JSON output on stdout stays machine-readable.
pub fn init(default_level: &str) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level/filter: {default_level}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to install log subscriber: {err}"))
}
