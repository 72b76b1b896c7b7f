//! Server configuration.
//!
//! All configuration is driven by environment variables. Unset variables keep
//! their defaults; [`ServerConfig::validate`] rejects values that cannot run.

use std::fmt;
use std::net::SocketAddr;

use crate::error::{RestDeckError, RestDeckResult};

/// Bytes per configured megabyte of multipart memory.
pub const BYTES_PER_MEGABYTE: u64 = 1_048_576;

/// Scheme reported by requests served on this listener.
///
/// TLS itself is terminated outside RestDeck; the scheme only drives URL
/// derivation (and the default port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain HTTP, default port 80.
    #[default]
    Http,
    /// HTTPS, default port 443.
    Https,
}

impl Scheme {
    /// Parse a scheme name, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("http") {
            Some(Self::Http)
        } else if value.eq_ignore_ascii_case("https") {
            Some(Self::Https)
        } else {
            None
        }
    }

    /// The scheme name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Port assumed when the `Host` header carries none.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global configuration for a RestDeck server.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address for the listener.
    pub listen_addr: String,
    /// Scheme reported in request URLs.
    pub scheme: Scheme,
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// In-memory ceiling for multipart bodies, in megabytes.
    pub multipart_memory_mb: u64,
    /// Content type applied to handler responses that set none.
    pub default_response_content_type: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:1337".to_owned(),
            scheme: Scheme::Http,
            log_level: "info".to_owned(),
            multipart_memory_mb: 10,
            default_response_content_type: "application/json".to_owned(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LISTEN_ADDR` | `0.0.0.0:1337` |
    /// | `SCHEME` | `http` |
    /// | `LOG_LEVEL` | `info` |
    /// | `MULTIPART_MEMORY_MB` | `10` |
    /// | `DEFAULT_RESPONSE_CONTENT_TYPE` | `application/json` |
    pub fn from_env() -> RestDeckResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RestDeckResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("LISTEN_ADDR") {
            config.listen_addr = v;
        }
        if let Some(v) = lookup("SCHEME") {
            config.scheme = Scheme::parse(&v)
                .ok_or_else(|| RestDeckError::Config(format!("unknown scheme: {v}")))?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("MULTIPART_MEMORY_MB") {
            config.multipart_memory_mb = v.trim().parse().map_err(|_| {
                RestDeckError::Config(format!("MULTIPART_MEMORY_MB is not an integer: {v}"))
            })?;
        }
        if let Some(v) = lookup("DEFAULT_RESPONSE_CONTENT_TYPE") {
            config.default_response_content_type = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every option is usable.
    pub fn validate(&self) -> RestDeckResult<()> {
        self.socket_addr()?;
        if self.multipart_memory_mb == 0 {
            return Err(RestDeckError::Config(
                "multipart memory ceiling must be at least 1 MB".to_owned(),
            ));
        }
        if http::HeaderValue::from_str(&self.default_response_content_type).is_err() {
            return Err(RestDeckError::Config(format!(
                "default response content type is not a valid header value: {}",
                self.default_response_content_type
            )));
        }
        Ok(())
    }

    /// The parsed bind address.
    pub fn socket_addr(&self) -> RestDeckResult<SocketAddr> {
        self.listen_addr.parse().map_err(|_| {
            RestDeckError::Config(format!("invalid bind address: {}", self.listen_addr))
        })
    }

    /// The multipart memory ceiling in bytes.
    #[must_use]
    pub fn multipart_memory_bytes(&self) -> u64 {
        self.multipart_memory_mb.saturating_mul(BYTES_PER_MEGABYTE)
    }
}
