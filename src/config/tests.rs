use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::load_config;
use super::settings::Settings;

const CLEAR: [(&str, Option<&str>); 4] = [
    ("PORT", None),
    ("FANOUT__SERVER__PORT", None),
    ("FANOUT__SERVER__HOST", None),
    ("FANOUT__BROKER__MAX_QUEUE_DEPTH", None),
];

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 4000);
    assert_eq!(settings.server.path, "/graphql");
    assert_eq!(settings.server.outbound_buffer, 64);
    assert_eq!(settings.broker.default_topic, "CHANNEL_MESSAGE");
    assert_eq!(settings.broker.max_queue_depth, 1024);
    assert_eq!(settings.broker.max_topic_len, 256);
    assert_eq!(settings.shutdown.drain_grace_ms, 5000);
    assert_eq!(settings.logging.level, "info");
}

#[test]
#[serial]
fn load_config_without_sources_uses_defaults() {
    temp_env::with_vars(CLEAR, || {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.server.port, 4000);
        assert_eq!(cfg.broker.max_queue_depth, 1024);
    });
}

#[test]
#[serial]
fn load_config_reads_prefixed_env() {
    temp_env::with_vars(
        [
            ("PORT", None),
            ("FANOUT__SERVER__PORT", Some("9100")),
            ("FANOUT__SERVER__HOST", Some("0.0.0.0")),
            ("FANOUT__BROKER__MAX_QUEUE_DEPTH", Some("8")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.host, "0.0.0.0");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.broker.max_queue_depth, 8);
            assert_eq!(cfg.broker.default_topic, "CHANNEL_MESSAGE");
        },
    );
}

#[test]
#[serial]
fn bare_port_env_wins() {
    temp_env::with_vars(
        [
            ("PORT", Some("5055")),
            ("FANOUT__SERVER__PORT", Some("9100")),
            ("FANOUT__SERVER__HOST", None),
            ("FANOUT__BROKER__MAX_QUEUE_DEPTH", None),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 5055);
        },
    );
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    temp_env::with_vars(CLEAR, || {
        let tmp = TempDir::new().expect("create tempdir");
        let orig = env::current_dir().expect("current_dir");
        env::set_current_dir(tmp.path()).expect("set current dir");

        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000
            path = ""
            outbound_buffer = 8

            [broker]
            default_topic = "lobby"
            max_queue_depth = 0

            [shutdown]
            drain_grace_ms = 250
        "#;
        fs::write("config/default.toml", toml).expect("write config file");

        let cfg = load_config();

        env::set_current_dir(orig).expect("restore cwd");

        let cfg = cfg.expect("load_config failed");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.path, "");
        assert_eq!(cfg.server.outbound_buffer, 8);
        assert_eq!(cfg.broker.default_topic, "lobby");
        assert_eq!(cfg.broker.max_queue_depth, 0);
        assert_eq!(cfg.broker.max_topic_len, 256);
        assert_eq!(cfg.shutdown.drain_grace().as_millis(), 250);
        assert_eq!(cfg.logging.level, "info");
    });
}
