// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded from
//! them at startup. A `.env` file in the working directory is read first
//! when present.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `accounts.redb` | `./data` |
//! | `JWT_ACCESS_SECRET` | HMAC secret for access tokens | Required |
//! | `JWT_REFRESH_SECRET` | HMAC secret for refresh tokens | Required |
//! | `JWT_VERIFICATION_SECRET` | HMAC secret for verification tokens | Required |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `900` |
//! | `REFRESH_TOKEN_TTL_SECS` | Refresh token lifetime | `604800` |
//! | `VERIFICATION_TOKEN_TTL_SECS` | Verification token lifetime | `86400` |
//! | `PERSONAL_ID_KEY` | HMAC key for provider personal id digests | Required |
//! | `PUBLIC_BASE_URL` | Base of links placed in letters | `http://localhost:8080` |
//! | `MAIL_FROM` | Sender address | `no-reply@localhost` |
//! | `MAIL_API_URL` | Mail relay endpoint | Optional (letters are logged) |
//! | `MAIL_API_KEY` | Mail relay bearer key | Required with `MAIL_API_URL` |
//! | `LEDGER_SWEEP_INTERVAL_SECS` | Verification ledger GC period | `600` |
//! | `CORS_ORIGINS` | Comma-separated allowed origins | Optional (permissive) |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Optional |
//! | `ARGON2_MEMORY_KIB` / `ARGON2_ITERATIONS` / `ARGON2_PARALLELISM` | Password hashing cost | `19456` / `2` / `1` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! The three JWT secrets must differ from each other. Token TTLs are capped
//! at ten years.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::auth::Argon2Params;
use crate::storage::ledger::DEFAULT_SWEEP_INTERVAL;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory holding the account database.
///
/// # Default
/// `./data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const JWT_ACCESS_SECRET_ENV: &str = "JWT_ACCESS_SECRET";
pub const JWT_REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";
pub const JWT_VERIFICATION_SECRET_ENV: &str = "JWT_VERIFICATION_SECRET";

pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";
pub const VERIFICATION_TOKEN_TTL_ENV: &str = "VERIFICATION_TOKEN_TTL_SECS";

/// Key for the HMAC digest of provider personal id numbers.
///
/// The number itself is never stored; digests made under an old key no
/// longer match after rotation.
pub const PERSONAL_ID_KEY_ENV: &str = "PERSONAL_ID_KEY";

pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const MAIL_FROM_ENV: &str = "MAIL_FROM";
pub const MAIL_API_URL_ENV: &str = "MAIL_API_URL";
pub const MAIL_API_KEY_ENV: &str = "MAIL_API_KEY";
pub const LEDGER_SWEEP_INTERVAL_ENV: &str = "LEDGER_SWEEP_INTERVAL_SECS";
pub const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const ARGON2_MEMORY_KIB_ENV: &str = "ARGON2_MEMORY_KIB";
pub const ARGON2_ITERATIONS_ENV: &str = "ARGON2_ITERATIONS";
pub const ARGON2_PARALLELISM_ENV: &str = "ARGON2_PARALLELISM";

/// `json` for JSON lines, anything else for human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_VERIFICATION_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_MAIL_FROM: &str = "no-reply@localhost";
/// Upper bound for any token TTL (ten years).
const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailRelayConfig {
    pub endpoint: Url,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub access_secret: String,
    pub refresh_secret: String,
    pub verification_secret: String,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
    pub verification_ttl: chrono::Duration,
    pub personal_id_key: String,
    pub public_base_url: Url,
    pub mail_from: String,
    pub mail_relay: Option<MailRelayConfig>,
    pub ledger_sweep_interval: Duration,
    pub cors_origins: Vec<String>,
    pub tls: Option<TlsPaths>,
    pub argon2: Argon2Params,
}

/// Reads variables through `lookup`; empty values count as unset.
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => match value.trim().parse::<T>() {
                Ok(parsed) => Ok(parsed),
                Err(e) => Err(ConfigError::Invalid {
                    name,
                    reason: e.to_string(),
                    value,
                }),
            },
        }
    }

    fn url(&self, name: &'static str, value: String) -> Result<Url, ConfigError> {
        Url::parse(&value).map_err(|e| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        })
    }

    fn ttl(&self, name: &'static str, default_secs: i64) -> Result<chrono::Duration, ConfigError> {
        let secs: i64 = self.parsed(name, default_secs)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&secs) {
            return Err(ConfigError::Invalid {
                name,
                value: secs.to_string(),
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_SECS} seconds"),
            });
        }
        chrono::Duration::try_seconds(secs).ok_or_else(|| ConfigError::Invalid {
            name,
            value: secs.to_string(),
            reason: "out of range".to_string(),
        })
    }

    /// The three JWT secrets, rejected when any two are equal.
    fn jwt_secrets(&self) -> Result<(String, String, String), ConfigError> {
        let access = self.required(JWT_ACCESS_SECRET_ENV)?;
        let refresh = self.required(JWT_REFRESH_SECRET_ENV)?;
        let verification = self.required(JWT_VERIFICATION_SECRET_ENV)?;

        let duplicate = if refresh == access {
            Some(JWT_REFRESH_SECRET_ENV)
        } else if verification == access || verification == refresh {
            Some(JWT_VERIFICATION_SECRET_ENV)
        } else {
            None
        };
        match duplicate {
            Some(name) => Err(ConfigError::Invalid {
                name,
                value: "<redacted>".to_string(),
                reason: "must differ from the other JWT secrets".to_string(),
            }),
            None => Ok((access, refresh, verification)),
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup };

        let public_base_url = env.url(
            PUBLIC_BASE_URL_ENV,
            env.optional(PUBLIC_BASE_URL_ENV)
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string()),
        )?;

        let mail_relay = match env.optional(MAIL_API_URL_ENV) {
            Some(endpoint) => Some(MailRelayConfig {
                endpoint: env.url(MAIL_API_URL_ENV, endpoint)?,
                api_key: env.required(MAIL_API_KEY_ENV)?,
            }),
            None => None,
        };

        let tls = match (env.optional(TLS_CERT_PATH_ENV), env.optional(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let (access_secret, refresh_secret, verification_secret) = env.jwt_secrets()?;

        let defaults = Argon2Params::default();
        let argon2 = Argon2Params {
            memory_kib: env.parsed(ARGON2_MEMORY_KIB_ENV, defaults.memory_kib)?,
            iterations: env.parsed(ARGON2_ITERATIONS_ENV, defaults.iterations)?,
            parallelism: env.parsed(ARGON2_PARALLELISM_ENV, defaults.parallelism)?,
        };

        let cors_origins = env
            .optional(CORS_ORIGINS_ENV)
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: env
                .optional(HOST_ENV)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: env.parsed(PORT_ENV, DEFAULT_PORT)?,
            data_dir: env
                .optional(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            access_secret,
            refresh_secret,
            verification_secret,
            access_ttl: env.ttl(ACCESS_TOKEN_TTL_ENV, DEFAULT_ACCESS_TTL_SECS)?,
            refresh_ttl: env.ttl(REFRESH_TOKEN_TTL_ENV, DEFAULT_REFRESH_TTL_SECS)?,
            verification_ttl: env.ttl(VERIFICATION_TOKEN_TTL_ENV, DEFAULT_VERIFICATION_TTL_SECS)?,
            personal_id_key: env.required(PERSONAL_ID_KEY_ENV)?,
            public_base_url,
            mail_from: env
                .optional(MAIL_FROM_ENV)
                .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            mail_relay,
            ledger_sweep_interval: Duration::from_secs(
                env.parsed(LEDGER_SWEEP_INTERVAL_ENV, DEFAULT_SWEEP_INTERVAL.as_secs())?
                    .max(1),
            ),
            cors_origins,
            tls,
            argon2,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
