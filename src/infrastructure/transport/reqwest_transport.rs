use super::traits::{CallMode, HttpRequest, HttpResponse, HttpTransport};
use crate::domain::errors::StorageError;
use async_trait::async_trait;
use std::time::Duration;

/// [`HttpTransport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::from_client(client))
    }

    /// Wraps a preconfigured client, e.g. one with a proxy or custom TLS roots.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
        mode: CallMode,
    ) -> Result<HttpResponse, StorageError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!(%method, %url, %status, "cloud files request");

        if mode == CallMode::RaiseOnError && (status.is_client_error() || status.is_server_error())
        {
            return Err(StorageError::Status { status, url });
        }

        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
