//! Server configuration.
//!
//! Sources are layered, later ones winning:
//! 1. built-in defaults,
//! 2. an optional `config/default.{toml,yaml,json}` file,
//! 3. `FANOUT__SECTION__KEY` environment variables,
//! 4. a bare `PORT` variable for the listen port.

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    BrokerSettings, LoggingSettings, ServerSettings, Settings, ShutdownSettings,
};

/// Loads the configuration from the default file and environment variables
/// and merges it over the default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::with_prefix("FANOUT").separator("__"))
        .set_override_option("server.port", std::env::var("PORT").ok())?;

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
