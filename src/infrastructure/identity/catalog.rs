//! Schema of the identity service's token response and the service-catalog
//! lookup performed on it.

use crate::domain::errors::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STORAGE_SERVICE: &str = "cloudFiles";
pub const CDN_SERVICE: &str = "cloudFilesCDN";

#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Debug, Serialize)]
struct AuthBody<'a> {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    api_key_credentials: ApiKeyCredentials<'a>,
}

#[derive(Debug, Serialize)]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

impl<'a> AuthRequest<'a> {
    pub fn new(username: &'a str, api_key: &'a str) -> Self {
        Self {
            auth: AuthBody {
                api_key_credentials: ApiKeyCredentials { username, api_key },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access: Access,
}

#[derive(Debug, Deserialize)]
pub struct Access {
    pub token: Token,
    #[serde(rename = "serviceCatalog")]
    pub service_catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(default)]
    pub expires: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogService {
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// Global services list endpoints without a region, hence the optionals.
#[derive(Debug, Deserialize)]
pub struct CatalogEndpoint {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "publicURL", default)]
    pub public_url: Option<String>,
}

/// One `(service, region, publicURL)` row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalogEntry {
    pub service_name: String,
    pub region: String,
    pub public_url: String,
}

impl AuthResponse {
    pub fn parse(body: &[u8]) -> Result<Self, StorageError> {
        let response: AuthResponse = serde_json::from_slice(body)
            .map_err(|e| StorageError::UnexpectedResponse(e.to_string()))?;
        if response.access.token.id.is_empty() {
            return Err(StorageError::UnexpectedResponse(
                "access.token.id is empty".into(),
            ));
        }
        Ok(response)
    }

    /// Token expiry; unparseable timestamps are treated as unknown.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.access.token.expires.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                tracing::debug!(expires = raw, error = %e, "ignoring unparseable token expiry");
                None
            }
        }
    }

    pub fn catalog_entries(&self) -> Vec<ServiceCatalogEntry> {
        self.access
            .service_catalog
            .iter()
            .flat_map(|service| {
                service.endpoints.iter().filter_map(|endpoint| {
                    Some(ServiceCatalogEntry {
                        service_name: service.name.clone(),
                        region: endpoint.region.clone()?,
                        public_url: endpoint.public_url.clone()?,
                    })
                })
            })
            .collect()
    }
}

/// Public URL of `service` in `region`, or an empty string.
///
/// Region matching is exact and case-sensitive. When the catalog lists the
/// same region twice, the later entry wins.
pub fn resolve_endpoint(entries: &[ServiceCatalogEntry], service: &str, region: &str) -> String {
    entries
        .iter()
        .rfind(|e| e.service_name == service && e.region == region)
        .map(|e| e.public_url.clone())
        .unwrap_or_default()
}
