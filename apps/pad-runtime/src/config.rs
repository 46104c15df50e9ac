// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the parsed [`RuntimeConfig`].
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for encrypted storage | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `ROOT_ACCOUNT` | Account id (hex) with admin rights in every contract | dev account |
//! | `RELAYER_JWT_SECRET` | HS256 secret for operator tokens | unset (development mode) |
//! | `JWT_ISSUER` | Expected `iss` claim of operator tokens | unset |
//! | `TLS_CERT_PATH` | PEM certificate chain (RA-TLS) | unset (plain HTTP) |
//! | `TLS_KEY_PATH` | PEM private key for `TLS_CERT_PATH` | unset |
//! | `PRICE_FEED_URL` | Price source for the price bot | cryptocompare |
//! | `TELEGRAM_API_URL` | Telegram Bot API base URL | `https://api.telegram.org` |
//! | `MAX_POST_BYTES` | Maximum encoded size of a post | `262144` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::contracts::notepad::DEFAULT_MAX_POST_BYTES;
use crate::contracts::price_bot::{
    PriceBotEndpoints, DEFAULT_PRICE_FEED_URL, DEFAULT_TELEGRAM_API_URL,
};
use crate::contracts::{AccountId, ContractSettings};
use crate::state::AuthConfig;
use crate::storage::paths::DATA_ROOT;

/// The data directory is mounted as Gramine's encrypted filesystem in the
/// manifest. Keys, the sealed snapshot and audit logs are stored here.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const ROOT_ACCOUNT_ENV: &str = "ROOT_ACCOUNT";
pub const RELAYER_JWT_SECRET_ENV: &str = "RELAYER_JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const PRICE_FEED_URL_ENV: &str = "PRICE_FEED_URL";
pub const TELEGRAM_API_URL_ENV: &str = "TELEGRAM_API_URL";
pub const MAX_POST_BYTES_ENV: &str = "MAX_POST_BYTES";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Well-known development root account.
pub const DEFAULT_ROOT_ACCOUNT: &str =
    "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// TLS certificate and key locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsPaths>,
    pub auth: AuthConfig,
    pub contracts: ContractSettings,
    pub log_format: LogFormat,
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Absolute http(s) URL.
fn parse_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    let url = url::Url::parse(&value).map_err(|e| invalid(var, &value, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(var, &value, "expected an http(s) URL"));
    }
    Ok(value)
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = PathBuf::from(lookup(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));

        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(port) => port.parse::<u16>().map_err(|e| invalid(PORT_ENV, &port, e))?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| invalid(HOST_ENV, &host, e))?;

        let tls = match (lookup(TLS_CERT_PATH_ENV), lookup(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        let root_hex =
            lookup(ROOT_ACCOUNT_ENV).unwrap_or_else(|| DEFAULT_ROOT_ACCOUNT.to_string());
        let root: AccountId = root_hex
            .parse()
            .map_err(|e| invalid(ROOT_ACCOUNT_ENV, &root_hex, e))?;

        let max_post_bytes = match lookup(MAX_POST_BYTES_ENV) {
            Some(value) => match value.parse::<usize>() {
                Ok(0) => return Err(invalid(MAX_POST_BYTES_ENV, &value, "must be positive")),
                Ok(n) => n,
                Err(e) => return Err(invalid(MAX_POST_BYTES_ENV, &value, e)),
            },
            None => DEFAULT_MAX_POST_BYTES,
        };

        let price_feed_url = match lookup(PRICE_FEED_URL_ENV) {
            Some(value) => parse_url(PRICE_FEED_URL_ENV, value)?,
            None => DEFAULT_PRICE_FEED_URL.to_string(),
        };
        let telegram_api_url = match lookup(TELEGRAM_API_URL_ENV) {
            Some(value) => parse_url(TELEGRAM_API_URL_ENV, value)?,
            None => DEFAULT_TELEGRAM_API_URL.to_string(),
        };

        let log_format = match lookup(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid(LOG_FORMAT_ENV, other, "expected `json` or `pretty`")),
        };

        Ok(Self {
            data_dir,
            bind_addr,
            tls,
            auth: AuthConfig {
                jwt_secret: lookup(RELAYER_JWT_SECRET_ENV),
                issuer: lookup(JWT_ISSUER_ENV),
            },
            contracts: ContractSettings {
                root,
                max_post_bytes,
                price_bot: PriceBotEndpoints {
                    price_feed_url,
                    telegram_api_url,
                },
            },
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<RuntimeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert!(config.tls.is_none());
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(config.contracts.root.to_hex(), DEFAULT_ROOT_ACCOUNT);
        assert_eq!(config.contracts.max_post_bytes, 256 * 1024);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn values_are_read_from_environment() {
        let config = config(&[
            ("DATA_DIR", "/tmp/pad"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8001"),
            ("RELAYER_JWT_SECRET", "s3cret"),
            ("JWT_ISSUER", "cipherpad"),
            ("TLS_CERT_PATH", "/certs/cert.pem"),
            ("TLS_KEY_PATH", "/certs/key.pem"),
            ("MAX_POST_BYTES", "1024"),
            ("PRICE_FEED_URL", "http://localhost:9000/price"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8001".parse().unwrap());
        assert_eq!(config.auth.issuer.as_deref(), Some("cipherpad"));
        assert_eq!(
            config.tls,
            Some(TlsPaths {
                cert: "/certs/cert.pem".into(),
                key: "/certs/key.pem".into(),
            })
        );
        assert_eq!(config.contracts.max_post_bytes, 1024);
        assert_eq!(
            config.contracts.price_bot.price_feed_url,
            "http://localhost:9000/price"
        );
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("ROOT_ACCOUNT", "abcd")]),
            Err(ConfigError::Invalid {
                var: "ROOT_ACCOUNT",
                ..
            })
        ));
        assert!(matches!(
            config(&[("MAX_POST_BYTES", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("TELEGRAM_API_URL", "ftp://example.com")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("TLS_CERT_PATH", "/certs/cert.pem")]),
            Err(ConfigError::Incomplete(..))
        ));
    }
}
