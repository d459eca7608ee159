use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

// tungstenite traces every frame at debug and below.
const QUIET_DEPENDENCIES: &str = "tungstenite=warn,tokio_tungstenite=warn";

/// Filter directives for `settings`: the configured level for fanout, with
/// the WebSocket stack held at `warn`. Unknown levels mean `info`.
pub fn directives(settings: &LoggingSettings) -> String {
    let level = match settings.level.trim().to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::WARN,
        other => LevelFilter::from_str(other).unwrap_or(LevelFilter::INFO),
    };
    format!(
        "{},{QUIET_DEPENDENCIES}",
        level.to_string().to_ascii_lowercase()
    )
}

/// Installs the global fmt subscriber. `RUST_LOG` replaces the configured
/// directives when set. Later calls are ignored.
pub fn init(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(settings)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
