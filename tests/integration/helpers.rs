use async_trait::async_trait;
use bytes::Bytes;
use cloudfiles::{
    ClientOptions, CloudFilesClient, Connection, Credentials, IdentityEndpoint, StorageError,
    infrastructure::transport::{CallMode, HttpRequest, HttpResponse, HttpTransport},
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::json;
use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

pub const IDENTITY_URL: &str = "https://identity.test/v2.0/";
pub const STORAGE_URL: &str = "https://storage.test/v1/MossoCloudFS_acct";
pub const CDN_URL: &str = "https://cdn.test/v1/MossoCloudFS_acct";
pub const REGION: &str = "DFW";
pub const CONTAINER: &str = "Profile Photos";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

/// In-memory stand-in for the identity, storage and CDN services.
///
/// Stores PUT bodies by URL and echoes them back on GET. Failures can be
/// injected per method; an injected failure is a transport error, so it
/// fails in either call mode.
#[derive(Default)]
pub struct FakeCloudFiles {
    objects: Mutex<HashMap<String, Bytes>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<Method, usize>>,
    cdn: Mutex<Option<(String, String)>>,
    reject_auth: Mutex<bool>,
}

impl FakeCloudFiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, method: Method, times: usize) {
        self.failures.lock().unwrap().insert(method, times);
    }

    pub fn enable_cdn(&self, https: &str, http: &str) {
        *self.cdn.lock().unwrap() = Some((https.to_string(), http.to_string()));
    }

    pub fn reject_auth(&self) {
        *self.reject_auth.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    pub fn last_call(&self, method: Method) -> RecordedCall {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .last()
            .expect("no call with that method was recorded")
    }

    pub fn stored(&self, url: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(url).cloned()
    }

    fn take_failure(&self, method: &Method) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(method) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    fn auth_response(&self) -> HttpResponse {
        if *self.reject_auth.lock().unwrap() {
            return respond(StatusCode::UNAUTHORIZED, HeaderMap::new(), "{}");
        }
        let body = json!({
            "access": {
                "token": { "id": "token-123", "expires": "2030-01-01T00:00:00.000Z" },
                "serviceCatalog": [
                    {
                        "name": "cloudFiles",
                        "endpoints": [
                            { "region": "ORD", "publicURL": "https://storage.ord.test/v1/MossoCloudFS_acct" },
                            { "region": REGION, "publicURL": STORAGE_URL }
                        ]
                    },
                    {
                        "name": "cloudFilesCDN",
                        "endpoints": [ { "region": REGION, "publicURL": CDN_URL } ]
                    }
                ]
            }
        });
        respond(StatusCode::OK, HeaderMap::new(), body.to_string())
    }

    fn cdn_response(&self) -> HttpResponse {
        match &*self.cdn.lock().unwrap() {
            Some((https, http)) => {
                let mut headers = HeaderMap::new();
                headers.insert("X-Cdn-Ssl-Uri", HeaderValue::from_str(https).unwrap());
                headers.insert("X-Cdn-Uri", HeaderValue::from_str(http).unwrap());
                respond(StatusCode::NO_CONTENT, headers, "")
            }
            None => respond(StatusCode::NOT_FOUND, HeaderMap::new(), ""),
        }
    }
}

fn respond(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> HttpResponse {
    HttpResponse {
        status,
        headers,
        body: body.into(),
    }
}

#[async_trait]
impl HttpTransport for FakeCloudFiles {
    async fn send(
        &self,
        request: HttpRequest,
        mode: CallMode,
    ) -> Result<HttpResponse, StorageError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
        });

        if self.take_failure(&request.method) {
            return Err(StorageError::Transport("injected failure".into()));
        }

        let response = if request.url.starts_with(IDENTITY_URL) {
            self.auth_response()
        } else if request.method == Method::HEAD && request.url.starts_with(CDN_URL) {
            self.cdn_response()
        } else if request.headers.get("x-auth-token").map(|v| v.as_bytes()) != Some(b"token-123".as_slice())
        {
            respond(StatusCode::UNAUTHORIZED, HeaderMap::new(), "")
        } else {
            let mut objects = self.objects.lock().unwrap();
            match request.method {
                Method::PUT => {
                    objects.insert(request.url.clone(), request.body.unwrap_or_default());
                    respond(StatusCode::CREATED, HeaderMap::new(), "")
                }
                Method::GET => match objects.get(&request.url) {
                    Some(body) => respond(StatusCode::OK, HeaderMap::new(), body.clone()),
                    None => respond(StatusCode::NOT_FOUND, HeaderMap::new(), "Not Found"),
                },
                Method::DELETE => match objects.remove(&request.url) {
                    Some(_) => respond(StatusCode::NO_CONTENT, HeaderMap::new(), ""),
                    None => respond(StatusCode::NOT_FOUND, HeaderMap::new(), "Not Found"),
                },
                _ => respond(StatusCode::METHOD_NOT_ALLOWED, HeaderMap::new(), ""),
            }
        };

        if mode == CallMode::RaiseOnError
            && (response.status.is_client_error() || response.status.is_server_error())
        {
            return Err(StorageError::Status {
                status: response.status,
                url: request.url,
            });
        }
        Ok(response)
    }
}

pub async fn connect_with_region(backend: &Arc<FakeCloudFiles>, region: &str) -> Connection {
    CloudFilesClient::connect(
        backend.clone(),
        CONTAINER,
        &Credentials::new("tester", "api-key"),
        region,
        &IdentityEndpoint::Custom(IDENTITY_URL.to_string()),
        ClientOptions {
            retry_delay: Duration::from_millis(1),
        },
    )
    .await
}

pub async fn spawn_client(backend: &Arc<FakeCloudFiles>) -> CloudFilesClient {
    connect_with_region(backend, REGION)
        .await
        .into_result()
        .expect("fake identity service accepts the credentials")
}

pub fn object_url(name: &str) -> String {
    format!("{}/Profile%20Photos/{}", STORAGE_URL, name)
}

/// Collects formatted log output so tests can count events by level.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Installs a capturing subscriber for the current thread until the
    /// guard is dropped. Works with the single-threaded `#[tokio::test]`
    /// runtime.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn count(&self, level: &str) -> usize {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| line.trim_start().starts_with(level))
            .count()
    }
}
