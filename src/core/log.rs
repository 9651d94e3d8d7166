use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const CRATE_TARGET: &str = "coinpulse";

/// Crate-scoped target filter and the fallback directive used when
/// `RUST_LOG` is not set. Everything is off unless `verbose`.
fn filters(verbose: bool) -> (Targets, &'static str) {
    let (level, directive) = if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::OFF, "off")
    };
    (Targets::new().with_target(CRATE_TARGET, level), directive)
}

/// Installs the global subscriber. Logs go to stderr so they never mix with
/// the tables printed on stdout.
pub fn init_logging(verbose: bool) -> Result<()> {
    let (app_filter, directive) = filters(verbose);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(app_filter)
        .with(env_filter)
        .try_init()
        .context("Failed to initialise logging")
}
