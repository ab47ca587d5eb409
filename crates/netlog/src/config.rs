// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_LOG_LEVEL, DEFAULT_PORT,
    DEFAULT_SEND_TIMEOUT_MS, DEFAULT_WS_URL,
};
use crate::errors::ConfigError;

/// Where and how the transport reaches the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Collector host for UDP and TCP
    pub host: String,
    /// Collector port for UDP and TCP
    pub port: u16,
    /// Collector URL for WebSocket
    pub url: String,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

impl TransportConfig {
    /// `host:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            url: DEFAULT_WS_URL.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            send_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
        }
    }
}

/// Runtime configuration of the relay. Queue and buffer sizes are fixed at
/// build time and are not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub transport: TransportConfig,
    /// Bound on each wait for a queued message. `None` waits forever.
    pub receive_timeout: Option<Duration>,
    /// Log level for local diagnostics (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            receive_timeout: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Reads `NETLOG_*` environment variables, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TransportConfig::default();

        let host = env::var("NETLOG_HOST").unwrap_or(defaults.host);
        let port = match env::var("NETLOG_PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                var: "NETLOG_PORT",
                value: raw,
            })?,
            Err(_) => defaults.port,
        };
        let url = env::var("NETLOG_WS_URL").unwrap_or(defaults.url);
        let connect_timeout =
            millis_from_env("NETLOG_CONNECT_TIMEOUT_MS")?.unwrap_or(defaults.connect_timeout);
        let send_timeout =
            millis_from_env("NETLOG_SEND_TIMEOUT_MS")?.unwrap_or(defaults.send_timeout);
        let receive_timeout = millis_from_env("NETLOG_RECEIVE_TIMEOUT_MS")?;
        let log_level = env::var("NETLOG_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let config = Self {
            transport: TransportConfig {
                host,
                port,
                url,
                connect_timeout,
                send_timeout,
            },
            receive_timeout,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.host.trim().is_empty() {
            return Err(ConfigError::Empty("NETLOG_HOST"));
        }

        if self.transport.port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "NETLOG_PORT",
                value: "0".to_string(),
            });
        }

        if self.transport.url.trim().is_empty() {
            return Err(ConfigError::Empty("NETLOG_WS_URL"));
        }

        for (var, value) in [
            ("NETLOG_CONNECT_TIMEOUT_MS", Some(self.transport.connect_timeout)),
            ("NETLOG_SEND_TIMEOUT_MS", Some(self.transport.send_timeout)),
            ("NETLOG_RECEIVE_TIMEOUT_MS", self.receive_timeout),
        ] {
            if value.is_some_and(|d| d.is_zero()) {
                return Err(ConfigError::InvalidValue {
                    var,
                    value: "0".to_string(),
                });
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                var: "NETLOG_LOG_LEVEL",
                value: self.log_level.clone(),
            });
        }

        Ok(())
    }
}

fn millis_from_env(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 7] = [
        "NETLOG_HOST",
        "NETLOG_PORT",
        "NETLOG_WS_URL",
        "NETLOG_CONNECT_TIMEOUT_MS",
        "NETLOG_SEND_TIMEOUT_MS",
        "NETLOG_RECEIVE_TIMEOUT_MS",
        "NETLOG_LOG_LEVEL",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = Config::from_env().expect("defaults should be valid");
        assert_eq!(config, Config::default());
        assert_eq!(config.receive_timeout, None);
        assert_eq!(config.transport.address(), "127.0.0.1:9514");
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("NETLOG_HOST", "collector.local");
        env::set_var("NETLOG_PORT", "6514");
        env::set_var("NETLOG_SEND_TIMEOUT_MS", "250");
        env::set_var("NETLOG_RECEIVE_TIMEOUT_MS", "60000");
        env::set_var("NETLOG_LOG_LEVEL", "DEBUG");

        let config = Config::from_env().expect("overrides should be valid");
        clear_env();

        assert_eq!(config.transport.address(), "collector.local:6514");
        assert_eq!(config.transport.send_timeout, Duration::from_millis(250));
        assert_eq!(config.receive_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_port() {
        clear_env();
        env::set_var("NETLOG_PORT", "not-a-port");
        let result = Config::from_env();
        clear_env();

        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                var: "NETLOG_PORT",
                value: "not-a-port".to_string()
            })
        );
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_timeout() {
        clear_env();
        env::set_var("NETLOG_SEND_TIMEOUT_MS", "soon");
        let result = Config::from_env();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_port() {
        let config = Config {
            transport: TransportConfig {
                port: 0,
                ..TransportConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            receive_timeout: Some(Duration::ZERO),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "chatty".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let config = TransportConfig {
            host: "::1".to_string(),
            port: 514,
            ..TransportConfig::default()
        };
        assert_eq!(config.address(), "[::1]:514");
    }
}
