use crate::config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system based on configuration.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// tally crates. `-v`/`-vv` on the CLI raises the level regardless.
pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let log_level = match cli_verbose {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tally={log_level}")),
    );

    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_current_span(true))
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
        }
        _ => {
            registry
                .with(fmt::layer().with_target(true))
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
        }
    }

    Ok(())
}
