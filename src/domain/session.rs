use chrono::{DateTime, Utc};
use std::{convert::Infallible, fmt, str::FromStr};

pub const US_IDENTITY_ENDPOINT: &str = "https://identity.api.rackspacecloud.com/v2.0/";
pub const UK_IDENTITY_ENDPOINT: &str = "https://lon.identity.api.rackspacecloud.com/v2.0/";

/// Which identity service issues the bearer token.
///
/// `Custom` points at any Keystone-v2-compatible base URL (private clouds,
/// local mock servers).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityEndpoint {
    #[default]
    Us,
    Uk,
    Custom(String),
}

impl IdentityEndpoint {
    pub fn base_url(&self) -> &str {
        match self {
            Self::Us => US_IDENTITY_ENDPOINT,
            Self::Uk => UK_IDENTITY_ENDPOINT,
            Self::Custom(url) => url,
        }
    }

    /// Token-issuance URL, `{base}tokens`.
    pub fn tokens_url(&self) -> String {
        let base = self.base_url();
        if base.ends_with('/') {
            format!("{}tokens", base)
        } else {
            format!("{}/tokens", base)
        }
    }
}

impl FromStr for IdentityEndpoint {
    type Err = Infallible;

    /// `"UK"` selects the London identity service; anything else means US.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("uk") {
            Ok(Self::Uk)
        } else {
            Ok(Self::Us)
        }
    }
}

/// Username / API-key pair for the `RAX-KSKEY:apiKeyCredentials` scheme.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Authenticated state shared by every request of one client.
///
/// Immutable once built. Tokens are not refreshed; after `expires_at` the
/// service starts rejecting calls.
#[derive(Clone)]
pub struct Session {
    token: String,
    storage_endpoint: String,
    cdn_endpoint: String,
    container: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        token: String,
        storage_endpoint: String,
        cdn_endpoint: String,
        container: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            token,
            storage_endpoint,
            cdn_endpoint,
            container,
            expires_at,
        }
    }

    /// Session of a client whose authentication failed.
    pub fn unauthenticated(container: String) -> Self {
        Self::new(String::new(), String::new(), String::new(), container, None)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Public `cloudFiles` URL for the region, empty when the catalog had none.
    pub fn storage_endpoint(&self) -> &str {
        &self.storage_endpoint
    }

    /// Public `cloudFilesCDN` URL for the region, empty when the catalog had none.
    pub fn cdn_endpoint(&self) -> &str {
        &self.cdn_endpoint
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("storage_endpoint", &self.storage_endpoint)
            .field("cdn_endpoint", &self.cdn_endpoint)
            .field("container", &self.container)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Container CDN base URLs, read from one metadata probe.
///
/// `None` fields mean the container is not CDN-enabled (or does not exist).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdnUrls {
    pub https: Option<String>,
    pub http: Option<String>,
}
