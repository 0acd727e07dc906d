use crate::{
    config::Config,
    domain::{
        errors::StorageError,
        object_name::{encode_uri_component, encode_utf7},
        session::{CdnUrls, Credentials, IdentityEndpoint, Session},
    },
    infrastructure::{
        transport::{CallMode, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport},
        identity::{
            authenticate,
            catalog::{CDN_SERVICE, STORAGE_SERVICE},
        },
    },
};
use bytes::Bytes;
use chrono::Utc;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use std::{
    fmt,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};
use tracing::{debug, error, info, instrument, warn};

/// Headers stored with CORS-enabled uploads.
pub const CORS_HEADERS: [(&str, &str); 5] = [
    ("X-Container-Meta-Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "*"),
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Expose-Headers",
        "Origin, X-Requested-With, Content-Type, Accept, Authorization",
    ),
    (
        "Access-Control-Request-Headers",
        "Origin, X-Requested-With, Content-Type, Accept, Authorization",
    ),
];

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const CDN_SSL_URI_HEADER: &str = "X-Cdn-Ssl-Uri";
const CDN_URI_HEADER: &str = "X-Cdn-Uri";

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(CORS_HEADERS.len());
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    headers
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Pause before the single retry of a failed delete or fetch.
    pub retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Outcome of authentication, reported next to the client it produced.
#[derive(Debug)]
pub enum SessionStatus {
    Authenticated,
    /// Authentication failed. Every operation on the client returns its
    /// failure sentinel without touching the network.
    Degraded(StorageError),
}

/// A client together with the result of its authentication.
///
/// Connecting never fails outright; callers decide whether a degraded
/// session matters to them.
#[derive(Debug)]
pub struct Connection {
    pub client: CloudFilesClient,
    pub status: SessionStatus,
}

impl Connection {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, SessionStatus::Authenticated)
    }

    pub fn into_client(self) -> CloudFilesClient {
        self.client
    }

    pub fn into_result(self) -> Result<CloudFilesClient, StorageError> {
        match self.status {
            SessionStatus::Authenticated => Ok(self.client),
            SessionStatus::Degraded(err) => Err(err),
        }
    }
}

/// Status and headers of a successful object request.
#[derive(Debug, Clone)]
pub struct ObjectResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl From<HttpResponse> for ObjectResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
        }
    }
}

/// An object PUT, before the name is transliterated.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub remote_name: String,
    pub payload: Bytes,
    pub content_type: Option<HeaderValue>,
    pub extra_headers: HeaderMap,
}

impl UploadRequest {
    pub fn new(remote_name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            remote_name: remote_name.into(),
            payload: payload.into(),
            content_type: None,
            extra_headers: HeaderMap::new(),
        }
    }

    pub fn content_type(mut self, content_type: HeaderValue) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_cors_headers(mut self) -> Self {
        self.extra_headers.extend(cors_headers());
        self
    }
}

/// Client for one Cloud Files container.
///
/// Holds one authenticated session and a lazily filled CDN URL cache.
/// Object operations come in two flavours: `try_*` methods return
/// [`StorageError`], the others log failures and return a sentinel
/// (`false`, `None` or an empty string).
pub struct CloudFilesClient {
    transport: Arc<dyn HttpTransport>,
    session: Session,
    cdn_urls: RwLock<Option<CdnUrls>>,
    retry_delay: Duration,
}

impl fmt::Debug for CloudFilesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudFilesClient")
            .field("session", &self.session)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl CloudFilesClient {
    /// Authenticates and builds a client for `container`.
    ///
    /// Failures are logged and reported through [`Connection::status`]; the
    /// returned client is always usable as a value.
    pub async fn connect(
        transport: Arc<dyn HttpTransport>,
        container: impl Into<String>,
        credentials: &Credentials,
        region: &str,
        identity: &IdentityEndpoint,
        options: ClientOptions,
    ) -> Connection {
        let container = container.into();

        if container.is_empty() {
            error!("Cloud Files client created without a container name");
            return Connection {
                client: Self::with_session(transport, Session::unauthenticated(container), options),
                status: SessionStatus::Degraded(StorageError::InvalidUrl(
                    "container name is empty".into(),
                )),
            };
        }

        match authenticate(transport.as_ref(), identity, credentials, region, &container).await {
            Ok(session) => Connection {
                client: Self::with_session(transport, session, options),
                status: SessionStatus::Authenticated,
            },
            Err(err) => {
                error!(
                    container = %container,
                    error = %err,
                    "Cloud Files authentication failed, client is degraded"
                );
                Connection {
                    client: Self::with_session(
                        transport,
                        Session::unauthenticated(container),
                        options,
                    ),
                    status: SessionStatus::Degraded(err),
                }
            }
        }
    }

    /// [`connect`](Self::connect) with a `reqwest` transport built from `config`.
    ///
    /// # Errors
    ///
    /// Only when the HTTP client itself cannot be constructed. Authentication
    /// problems are reported through the returned [`Connection`].
    pub async fn from_config(config: &Config) -> Result<Connection, StorageError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::connect(
            Arc::new(transport),
            config.container.clone(),
            &config.credentials,
            &config.region,
            &config.identity_endpoint(),
            ClientOptions {
                retry_delay: config.retry_delay(),
            },
        )
        .await)
    }

    /// Builds a client around an existing session without contacting the
    /// identity service.
    pub fn with_session(
        transport: Arc<dyn HttpTransport>,
        session: Session,
        options: ClientOptions,
    ) -> Self {
        Self {
            transport,
            session,
            cdn_urls: RwLock::new(None),
            retry_delay: options.retry_delay,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn container(&self) -> &str {
        self.session.container()
    }

    /// `{endpoint}/{container}`, with the container as one path segment.
    fn container_url(
        &self,
        endpoint: &str,
        service: &'static str,
    ) -> Result<reqwest::Url, StorageError> {
        if !self.session.is_authenticated() {
            return Err(StorageError::NotAuthenticated);
        }
        if endpoint.is_empty() {
            return Err(StorageError::EndpointMissing(service));
        }
        if self.session.is_expired(Utc::now()) {
            warn!(
                container = self.container(),
                "auth token has expired, requests will be rejected until the client reconnects"
            );
        }
        let mut url = reqwest::Url::parse(endpoint)
            .map_err(|e| StorageError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl(endpoint.to_string()))?
            .pop_if_empty()
            .push(self.session.container());
        Ok(url)
    }

    /// `{endpoint}/{container}/{object}`; `/` inside the object name keeps
    /// separating pseudo-directories.
    ///
    /// Empty names and `.`/`..` segments are rejected: URL normalisation
    /// would fold them away and address the container or another object.
    fn object_url(&self, object: &str) -> Result<String, StorageError> {
        if object.is_empty() {
            return Err(StorageError::InvalidObjectName("object name is empty".into()));
        }
        if object.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(StorageError::InvalidObjectName(format!(
                "{}: dot segments are not allowed",
                object
            )));
        }
        let mut url = self.container_url(self.session.storage_endpoint(), STORAGE_SERVICE)?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl(self.session.storage_endpoint().to_string()))?
            .extend(object.split('/'));
        Ok(url.into())
    }

    fn token_header(&self) -> Result<HeaderMap, StorageError> {
        let token = HeaderValue::from_str(self.session.token())
            .map_err(|_| StorageError::UnexpectedResponse("token is not a valid header".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, token);
        Ok(headers)
    }

    fn control_headers(&self) -> Result<HeaderMap, StorageError> {
        let mut headers = self.token_header()?;
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }

    fn cached_cdn_urls(&self) -> Option<CdnUrls> {
        self.cdn_urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn probe_cdn_urls(&self) -> Result<CdnUrls, StorageError> {
        let url = self.container_url(self.session.cdn_endpoint(), CDN_SERVICE)?;
        let request =
            HttpRequest::new(Method::HEAD, url.as_str()).with_headers(self.control_headers()?);
        let response = self.transport.send(request, CallMode::ReturnStatus).await?;
        debug!(status = %response.status, container = self.container(), "CDN metadata probe");

        Ok(CdnUrls {
            https: response.header_str(CDN_SSL_URI_HEADER).map(str::to_owned),
            http: response.header_str(CDN_URI_HEADER).map(str::to_owned),
        })
    }

    /// The container's CDN base URLs, probing the CDN service on first use.
    ///
    /// The probe result is kept for the life of the client, including a
    /// result with no URLs. Transport failures are not cached.
    pub async fn cdn_urls(&self) -> CdnUrls {
        if let Some(cached) = self.cached_cdn_urls() {
            return cached;
        }

        let urls = match self.probe_cdn_urls().await {
            Ok(urls) => {
                if urls.https.is_none() && urls.http.is_none() {
                    info!(
                        container = self.container(),
                        "container is not CDN-enabled"
                    );
                }
                urls
            }
            Err(StorageError::Transport(msg)) => {
                warn!(container = self.container(), error = %msg, "CDN metadata probe failed");
                return CdnUrls::default();
            }
            Err(err) => {
                warn!(container = self.container(), error = %err, "CDN URLs unavailable");
                CdnUrls::default()
            }
        };

        *self
            .cdn_urls
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(urls.clone());
        urls
    }

    /// HTTPS CDN URL for `filename`, or `None` when the container is not
    /// CDN-enabled.
    pub async fn https_url_for_object(&self, filename: &str) -> Option<String> {
        let base = self.cdn_urls().await.https?;
        Some(format!("{}/{}", base, encode_uri_component(filename)))
    }

    /// HTTP CDN URL for `filename`, or `None` when the container is not
    /// CDN-enabled.
    pub async fn http_url_for_object(&self, filename: &str) -> Option<String> {
        let base = self.cdn_urls().await.http?;
        Some(format!("{}/{}", base, encode_uri_component(filename)))
    }

    /// Sends a control request, retrying once after `retry_delay`.
    async fn send_with_retry(
        &self,
        method: Method,
        filename: &str,
    ) -> Result<HttpResponse, StorageError> {
        let url = self.object_url(filename)?;
        let request = HttpRequest::new(method, url).with_headers(self.control_headers()?);

        match self
            .transport
            .send(request.clone(), CallMode::RaiseOnError)
            .await
        {
            Ok(response) => Ok(response),
            Err(err) => {
                debug!(
                    method = %request.method,
                    object = filename,
                    error = %err,
                    "request failed, retrying once"
                );
                tokio::time::sleep(self.retry_delay).await;
                self.transport.send(request, CallMode::RaiseOnError).await
            }
        }
    }

    #[instrument(skip(self), fields(container = self.container()))]
    pub async fn try_delete_object(&self, filename: &str) -> Result<ObjectResponse, StorageError> {
        self.send_with_retry(Method::DELETE, filename)
            .await
            .map(ObjectResponse::from)
    }

    /// Deletes `filename`. `None` means the delete failed twice; a missing
    /// object and a network failure look the same here.
    pub async fn delete_object(&self, filename: &str) -> Option<ObjectResponse> {
        match self.try_delete_object(filename).await {
            Ok(response) => Some(response),
            Err(err) => {
                error!(
                    status = ?err.status(),
                    error = %err,
                    object = filename,
                    container = self.container(),
                    "Error deleting Cloud Files object"
                );
                None
            }
        }
    }

    #[instrument(skip(self), fields(container = self.container()))]
    pub async fn try_get_object_as_string(&self, filename: &str) -> Result<String, StorageError> {
        let response = self.send_with_retry(Method::GET, filename).await?;
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    /// Fetches `filename` as text. An empty string means either an empty
    /// object or a fetch that failed twice.
    pub async fn get_object_as_string(&self, filename: &str) -> String {
        match self.try_get_object_as_string(filename).await {
            Ok(body) => body,
            Err(err) => {
                error!(
                    status = ?err.status(),
                    error = %err,
                    object = filename,
                    container = self.container(),
                    "Error getting Cloud Files object"
                );
                String::new()
            }
        }
    }

    /// PUTs an object. The remote name is transliterated to UTF-7 first.
    #[instrument(skip(self, request), fields(container = self.container(), object = %request.remote_name, size = request.payload.len()))]
    pub async fn try_upload(&self, request: UploadRequest) -> Result<ObjectResponse, StorageError> {
        let remote_name = encode_utf7(&request.remote_name);
        let url = self.object_url(&remote_name)?;

        let mut headers = self.token_header()?;
        headers.extend(request.extra_headers);
        if let Some(content_type) = request.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }

        let response = self
            .transport
            .send(
                HttpRequest::new(Method::PUT, url.as_str())
                    .with_headers(headers)
                    .with_body(request.payload),
                CallMode::RaiseOnError,
            )
            .await?;

        if !response.status.is_success() {
            return Err(StorageError::Status {
                status: response.status,
                url,
            });
        }
        debug!(remote_name = %remote_name, status = %response.status, "object stored");
        Ok(response.into())
    }

    /// Uploads a local file with CORS headers, then removes the local file.
    ///
    /// The file is only removed after the service accepted the upload.
    pub async fn try_upload_from_local_file(
        &self,
        remote_name: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<ObjectResponse, StorageError> {
        let local_path = local_path.as_ref();
        let payload = tokio::fs::read(local_path).await?;

        let mut request = UploadRequest::new(remote_name, payload).with_cors_headers();
        match mime_guess::from_path(local_path).first() {
            Some(mime) => match HeaderValue::from_str(mime.as_ref()) {
                Ok(value) => request = request.content_type(value),
                Err(_) => debug!(%mime, "skipping unrepresentable content type"),
            },
            None => debug!(path = %local_path.display(), "no content type detected"),
        }

        let response = self.try_upload(request).await?;

        if let Err(err) = tokio::fs::remove_file(local_path).await {
            warn!(path = %local_path.display(), error = %err, "uploaded file could not be removed");
        }
        Ok(response)
    }

    pub async fn upload_from_local_file(
        &self,
        remote_name: &str,
        local_path: impl AsRef<Path>,
    ) -> bool {
        match self.try_upload_from_local_file(remote_name, local_path).await {
            Ok(_) => true,
            Err(err) => {
                error!(
                    status = ?err.status(),
                    error = %err,
                    container = self.container(),
                    "Error uploading file to Cloud Files from a file"
                );
                false
            }
        }
    }

    /// Uploads `content` as the object body. CORS headers are attached only
    /// when asked for.
    pub async fn try_upload_from_string(
        &self,
        remote_name: &str,
        content: &str,
        include_cors_headers: bool,
    ) -> Result<ObjectResponse, StorageError> {
        let mut request = UploadRequest::new(remote_name, content.to_owned())
            .content_type(HeaderValue::from_static("application/json"));
        if include_cors_headers {
            request = request.with_cors_headers();
        }
        self.try_upload(request).await
    }

    pub async fn upload_from_string(
        &self,
        remote_name: &str,
        content: &str,
        include_cors_headers: bool,
    ) -> bool {
        match self
            .try_upload_from_string(remote_name, content, include_cors_headers)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                error!(
                    status = ?err.status(),
                    error = %err,
                    container = self.container(),
                    "Error uploading file to Cloud Files from a string"
                );
                false
            }
        }
    }
}
