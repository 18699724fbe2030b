//! # Server Configuration
//!
//! Read once from the environment at startup:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `PORT` | `8080` | HTTP listen port |
//! | `HEARTH_AUTH_SECRET` | unset | bearer secret; unset disables auth |
//! | `HEARTH_POLICY` | unset | path to a YAML care-policy file |
//! | `HEARTH_LOG_FORMAT` | `text` | `text` or `json` |
//! | `HEARTH_SWEEP_INTERVAL_SECS` | `60` | stale-booking sweep period |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got \"{value}\"")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Shared bearer secret. `None` disables authentication.
    pub auth_secret: Option<String>,
    pub policy_path: Option<PathBuf>,
    pub log_format: LogFormat,
    pub sweep_interval: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_secret",
                &self.auth_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("policy_path", &self.policy_path)
            .field("log_format", &self.log_format)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_secret: None,
            policy_path: None,
            log_format: LogFormat::Text,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(v) => v.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: v,
                expected: "a TCP port number",
            })?,
            None => defaults.port,
        };

        let log_format = match get("HEARTH_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "HEARTH_LOG_FORMAT",
                    value: other.to_string(),
                    expected: "\"text\" or \"json\"",
                })
            }
        };

        let sweep_interval = match get("HEARTH_SWEEP_INTERVAL_SECS") {
            Some(v) => match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "HEARTH_SWEEP_INTERVAL_SECS",
                        value: v,
                        expected: "a positive number of seconds",
                    })
                }
            },
            None => defaults.sweep_interval,
        };

        Ok(Self {
            port,
            auth_secret: get("HEARTH_AUTH_SECRET"),
            policy_path: get("HEARTH_POLICY").map(PathBuf::from),
            log_format,
            sweep_interval,
        })
    }
}
