//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// How `/handleResult` applies a worker's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// Replace the stored record wholesale; unknown ids are ignored.
    #[default]
    Overwrite,
    /// Only accept `in_progress -> completed` with a finite result.
    Strict,
}

impl FromStr for ReportMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("Unknown report mode: {}", s)),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Landing page served at `/`.
    pub index_path: PathBuf,
    /// Report handling policy.
    pub report_mode: ReportMode,
    /// Capacity of the task event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            index_path: PathBuf::from("index.html"),
            report_mode: ReportMode::Overwrite,
            event_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Build from `DISPATCH_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Absent keys take the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("DISPATCH_HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "DISPATCH_PORT")?.unwrap_or(defaults.port);
        let index_path = lookup("DISPATCH_INDEX_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.index_path);
        let report_mode =
            parse_var(&lookup, "DISPATCH_REPORT_MODE")?.unwrap_or(defaults.report_mode);
        let event_capacity =
            parse_var(&lookup, "DISPATCH_EVENT_CAPACITY")?.unwrap_or(defaults.event_capacity);

        if event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DISPATCH_EVENT_CAPACITY".to_string(),
                message: "must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(Self {
            host,
            port,
            index_path,
            report_mode,
            event_capacity,
        })
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> std::result::Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::Error;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_stock_server() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.index_path, PathBuf::from("index.html"));
        assert_eq!(config.report_mode, ReportMode::Overwrite);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DISPATCH_HOST", "127.0.0.1"),
            ("DISPATCH_PORT", "9090"),
            ("DISPATCH_INDEX_PATH", "/srv/www/index.html"),
            ("DISPATCH_REPORT_MODE", "strict"),
            ("DISPATCH_EVENT_CAPACITY", "16"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
        assert_eq!(config.index_path, PathBuf::from("/srv/www/index.html"));
        assert_eq!(config.report_mode, ReportMode::Strict);
        assert_eq!(config.event_capacity, 16);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[("DISPATCH_PORT", "eighty")]))
            .unwrap_err();
        match err {
            Error::Config(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "DISPATCH_PORT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_report_mode_is_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[("DISPATCH_REPORT_MODE", "lenient")]))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown report mode: lenient"));
    }

    #[test]
    fn zero_event_capacity_is_rejected() {
        assert!(
            ServerConfig::from_lookup(lookup_from(&[("DISPATCH_EVENT_CAPACITY", "0")])).is_err()
        );
    }
}
