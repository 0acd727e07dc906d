//! Client configuration loading from environment variables.
//!
//! # Environment Variables
//!
//! ## Required Variables
//! - `CLOUDFILES_USERNAME`: Rackspace account username
//! - `CLOUDFILES_API_KEY`: Rackspace API key
//! - `CLOUDFILES_REGION`: Region whose endpoints are used (e.g. `DFW`, `ORD`, `LON`)
//! - `CLOUDFILES_CONTAINER`: Container all operations act on
//!
//! ## Optional Variables
//! - `CLOUDFILES_IDENTITY`: `US` or `UK` identity service (default: `US`)
//! - `CLOUDFILES_IDENTITY_URL`: Identity base URL overriding `CLOUDFILES_IDENTITY`
//! - `CLOUDFILES_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 60)
//! - `CLOUDFILES_RETRY_DELAY_MS`: Pause before retrying a delete or fetch (default: 100)
//! - `RUST_LOG`: Logging level (default: "info,cloudfiles=debug")

use crate::domain::session::{Credentials, IdentityEndpoint};
use std::time::Duration;

/// Complete client configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Username / API key pair sent to the identity service
    pub credentials: Credentials,

    /// Region matched against the service catalog, case-sensitive
    pub region: String,

    /// Container name
    pub container: String,

    /// Identity service selected by the `US` / `UK` flag
    pub identity: IdentityEndpoint,

    /// Explicit identity base URL, e.g. a private cloud or a test server
    pub identity_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Delay before the single retry of a delete or fetch, in milliseconds
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required environment variable is missing or
    /// cannot be parsed to the expected type.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            credentials: Credentials::new(
                env_required("CLOUDFILES_USERNAME")?,
                env_required("CLOUDFILES_API_KEY")?,
            ),
            region: env_required("CLOUDFILES_REGION")?,
            container: env_required("CLOUDFILES_CONTAINER")?,
            identity: env_or("CLOUDFILES_IDENTITY", IdentityEndpoint::Us)?,
            identity_url: std::env::var("CLOUDFILES_IDENTITY_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            request_timeout_secs: env_or("CLOUDFILES_REQUEST_TIMEOUT_SECS", 60)?,
            retry_delay_ms: env_or("CLOUDFILES_RETRY_DELAY_MS", 100)?,
        })
    }

    /// The identity service to authenticate against; the URL override wins.
    pub fn identity_endpoint(&self) -> IdentityEndpoint {
        match &self.identity_url {
            Some(url) => IdentityEndpoint::Custom(url.clone()),
            None => self.identity.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Load a required environment variable.
///
/// # Errors
///
/// Returns an error if the variable is not set.
fn env_required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("Missing required environment variable: {}", key))
}

/// Load an environment variable with a default value.
///
/// # Errors
///
/// Returns an error if the variable is set but cannot be parsed.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
