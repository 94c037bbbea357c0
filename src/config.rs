// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `WALLET_URL` | Base URL of the wallet service | Required |
//! | `WALLET_ADMIN_KEY` | Admin credential for wallet registration | Required |
//! | `PAYMAIL_DOMAIN` | Domain of derived paymail addresses | Required |
//! | `HASH_SALT` | Process-wide password hash salt | Required |
//! | `SESSION_SECRET` | Session cookie HMAC key (>= 32 bytes) | Required |
//! | `SESSION_TTL_SECS` | Absolute session lifetime | `1800` |
//! | `COOKIE_SECURE` | Mark the session cookie `Secure` | `false` |
//! | `CORS_ALLOWED_ORIGINS` | Comma separated origins; empty allows any | empty |
//! | `WS_REFRESH_WINDOW_SECS` | Socket liveness window | `10` |
//! | `DISPATCH_WORKERS` | Background recording workers | `4` |
//! | `DISPATCH_QUEUE_CAPACITY` | Recording queue length | `64` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! `HASH_SALT` is a single global salt. It stretches passwords into key
//! material and is not a per-user credential store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::dispatch::{DispatchConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::logging::LogFormat;
use crate::notify::gateway::{GatewayConfig, DEFAULT_OUTBOUND_BUFFER};
use crate::session::SessionConfig;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const WALLET_URL_ENV: &str = "WALLET_URL";
pub const WALLET_ADMIN_KEY_ENV: &str = "WALLET_ADMIN_KEY";
pub const PAYMAIL_DOMAIN_ENV: &str = "PAYMAIL_DOMAIN";
pub const HASH_SALT_ENV: &str = "HASH_SALT";
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const SESSION_TTL_SECS_ENV: &str = "SESSION_TTL_SECS";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const CORS_ALLOWED_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";
pub const WS_REFRESH_WINDOW_SECS_ENV: &str = "WS_REFRESH_WINDOW_SECS";
pub const DISPATCH_WORKERS_ENV: &str = "DISPATCH_WORKERS";
pub const DISPATCH_QUEUE_CAPACITY_ENV: &str = "DISPATCH_QUEUE_CAPACITY";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL_SECS: u64 = 1800;
const DEFAULT_WS_REFRESH_WINDOW_SECS: u64 = 10;

/// Minimum length of `SESSION_SECRET` in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// PEM certificate and key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub wallet_url: Url,
    pub wallet_admin_key: Zeroizing<String>,
    pub paymail_domain: String,
    pub hash_salt: Zeroizing<String>,
    pub session_secret: Zeroizing<Vec<u8>>,
    pub session: SessionConfig,
    pub cors_allowed_origins: Vec<String>,
    pub gateway: GatewayConfig,
    pub dispatch: DispatchConfig,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("wallet_url", &self.wallet_url.as_str())
            .field("paymail_domain", &self.paymail_domain)
            .field("session", &self.session)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("gateway", &self.gateway)
            .field("dispatch", &self.dispatch)
            .field("tls", &self.tls)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    /// or `None` when unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let wallet_url = Url::parse(&required(WALLET_URL_ENV)?).map_err(|e| ConfigError::Invalid {
            name: WALLET_URL_ENV,
            reason: e.to_string(),
        })?;

        let paymail_domain = required(PAYMAIL_DOMAIN_ENV)?.to_ascii_lowercase();
        if paymail_domain.contains('@') || paymail_domain.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                name: PAYMAIL_DOMAIN_ENV,
                reason: "expected a bare domain".into(),
            });
        }

        let session_secret = Zeroizing::new(required(SESSION_SECRET_ENV)?.into_bytes());
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: SESSION_SECRET_ENV,
                reason: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            });
        }

        let session = SessionConfig {
            ttl_secs: parse_or(get(SESSION_TTL_SECS_ENV), SESSION_TTL_SECS_ENV, DEFAULT_SESSION_TTL_SECS)?,
            secure: parse_bool(get(COOKIE_SECURE_ENV), COOKIE_SECURE_ENV)?,
        };

        let cors_allowed_origins = get(CORS_ALLOWED_ORIGINS_ENV)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let refresh_secs = parse_or(
            get(WS_REFRESH_WINDOW_SECS_ENV),
            WS_REFRESH_WINDOW_SECS_ENV,
            DEFAULT_WS_REFRESH_WINDOW_SECS,
        )?;
        let gateway = GatewayConfig {
            refresh_window: Duration::from_secs(refresh_secs.max(1)),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        };

        let dispatch = DispatchConfig {
            workers: parse_or(get(DISPATCH_WORKERS_ENV), DISPATCH_WORKERS_ENV, DEFAULT_WORKERS)?,
            queue_capacity: parse_or(
                get(DISPATCH_QUEUE_CAPACITY_ENV),
                DISPATCH_QUEUE_CAPACITY_ENV,
                DEFAULT_QUEUE_CAPACITY,
            )?,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            wallet_url,
            wallet_admin_key: Zeroizing::new(required(WALLET_ADMIN_KEY_ENV)?),
            paymail_domain,
            hash_salt: Zeroizing::new(required(HASH_SALT_ENV)?),
            session_secret,
            session,
            cors_allowed_origins,
            gateway,
            dispatch,
            tls,
            log_format,
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}
