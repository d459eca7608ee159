use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the server, the broker, shutdown and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub shutdown: ShutdownSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to, and the request path
/// WebSocket upgrades are accepted on. An empty path accepts any path.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Frames a connection may hold for its writer before delivery waits on
    /// the socket.
    pub outbound_buffer: usize,
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Topic used when a client omits one.
    pub default_topic: String,
    /// Events a subscriber may fall behind before it is disconnected. `0`
    /// disables the limit.
    pub max_queue_depth: usize,
    pub max_topic_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShutdownSettings {
    pub drain_grace_ms: u64,
}

impl ShutdownSettings {
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub shutdown: Option<PartialShutdownSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub outbound_buffer: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub default_topic: Option<String>,
    pub max_queue_depth: Option<usize>,
    pub max_topic_len: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialShutdownSettings {
    pub drain_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            path: "/graphql".to_string(),
            outbound_buffer: 64,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            default_topic: "CHANNEL_MESSAGE".to_string(),
            max_queue_depth: 1024,
            max_topic_len: 256,
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_grace_ms: 5000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            broker: BrokerSettings::default(),
            shutdown: ShutdownSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl PartialSettings {
    /// Fills every missing field from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let broker = self.broker;
        let shutdown = self.shutdown;
        let logging = self.logging;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                path: server
                    .as_ref()
                    .and_then(|s| s.path.clone())
                    .unwrap_or(default.server.path),
                outbound_buffer: server
                    .as_ref()
                    .and_then(|s| s.outbound_buffer)
                    .unwrap_or(default.server.outbound_buffer),
            },
            broker: BrokerSettings {
                default_topic: broker
                    .as_ref()
                    .and_then(|b| b.default_topic.clone())
                    .unwrap_or(default.broker.default_topic),
                max_queue_depth: broker
                    .as_ref()
                    .and_then(|b| b.max_queue_depth)
                    .unwrap_or(default.broker.max_queue_depth),
                max_topic_len: broker
                    .as_ref()
                    .and_then(|b| b.max_topic_len)
                    .unwrap_or(default.broker.max_topic_len),
            },
            shutdown: ShutdownSettings {
                drain_grace_ms: shutdown
                    .as_ref()
                    .and_then(|s| s.drain_grace_ms)
                    .unwrap_or(default.shutdown.drain_grace_ms),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
