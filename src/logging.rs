use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::LogConfig;
use crate::{fmt, Error};

/// Always applied on top of the configured level.
const CRATE_DIRECTIVES: [&str; 2] = ["sqlx=warn", "topscores::store=info"];

/// Console on stderr, a readable log file and a JSON log file.
/// stdout is left to the rendered leaderboard.
pub fn init(config: &LogConfig) -> Result<(), Error> {
    let timer = tracing_subscriber::fmt::time::OffsetTime::local_rfc_3339()
        .map_err(|e| fmt!("local time offset must be available: {e}"))?;

    let env_override = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = build_filter(&config.level, env_override.as_deref())?;

    let console_layer = default_layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone());

    let text_file_layer = default_layer()
        .pretty()
        .with_writer(Arc::new(open_log_file(&config.path)?))
        .with_timer(timer.clone())
        .with_ansi(false);

    let json_file_layer = default_layer()
        .json()
        .with_writer(Arc::new(open_log_file(&config.json_path)?))
        .with_timer(timer)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(text_file_layer)
        .with(json_file_layer)
        .try_init()?;

    Ok(())
}

/// `RUST_LOG` wins when it parses; a bad configured level is an error.
fn build_filter(level: &str, env_override: Option<&str>) -> Result<EnvFilter, Error> {
    let base = match env_override.map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        _ => EnvFilter::try_new(level).map_err(|e| fmt!("invalid log level '{level}': {e}"))?,
    };

    CRATE_DIRECTIVES.iter().try_fold(base, |filter, directive| {
        Ok(filter.add_directive(directive.parse()?))
    })
}

fn open_log_file(path: &Path) -> Result<File, Error> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| fmt!("cannot open log file {}: {e}", path.display()).into())
}

fn default_layer<S>() -> tracing_subscriber::fmt::Layer<S>
where
    S: Subscriber,
{
    tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
}
