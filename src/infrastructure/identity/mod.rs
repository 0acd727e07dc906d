pub mod catalog;

use crate::{
    domain::{
        errors::StorageError,
        session::{Credentials, IdentityEndpoint, Session},
    },
    infrastructure::transport::{CallMode, HttpRequest, HttpTransport},
};
use catalog::{AuthRequest, AuthResponse, CDN_SERVICE, STORAGE_SERVICE, resolve_endpoint};
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use tracing::{info, instrument, warn};

/// Exchanges an API key for a bearer token and resolves the region's
/// storage and CDN endpoints.
///
/// A region missing from the catalog is not an error here: the matching
/// endpoint is left empty and operations against it fail later.
#[instrument(skip(transport, credentials, identity), fields(username = %credentials.username, identity = identity.base_url()))]
pub async fn authenticate(
    transport: &dyn HttpTransport,
    identity: &IdentityEndpoint,
    credentials: &Credentials,
    region: &str,
    container: &str,
) -> Result<Session, StorageError> {
    let body = serde_json::to_vec(&AuthRequest::new(
        &credentials.username,
        &credentials.api_key,
    ))
    .map_err(|e| StorageError::UnexpectedResponse(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    let request = HttpRequest::new(Method::POST, identity.tokens_url())
        .with_headers(headers)
        .with_body(body);
    let response = transport.send(request, CallMode::ReturnStatus).await?;

    if response.status != StatusCode::OK {
        warn!(
            status = %response.status,
            body = %String::from_utf8_lossy(&response.body),
            "Unhandled response from identity service"
        );
        return Err(StorageError::AuthRejected(response.status));
    }

    let parsed = AuthResponse::parse(&response.body)?;
    let entries = parsed.catalog_entries();
    let storage_endpoint = resolve_endpoint(&entries, STORAGE_SERVICE, region);
    let cdn_endpoint = resolve_endpoint(&entries, CDN_SERVICE, region);

    if storage_endpoint.is_empty() {
        warn!(region, "service catalog has no {} endpoint", STORAGE_SERVICE);
    }
    if cdn_endpoint.is_empty() {
        warn!(region, "service catalog has no {} endpoint", CDN_SERVICE);
    }

    let expires_at = parsed.expires_at();
    info!(region, container, expires_at = ?expires_at, "authenticated with identity service");

    Ok(Session::new(
        parsed.access.token.id,
        storage_endpoint,
        cdn_endpoint,
        container.to_string(),
        expires_at,
    ))
}
