//! End-to-end runs of the reqwest transport against a local mock server.

use cloudfiles::{CloudFilesClient, Config, Credentials, IdentityEndpoint, StorageError};
use http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    Config {
        credentials: Credentials::new("wire-user", "wire-key"),
        region: "IAD".into(),
        container: "site assets".into(),
        identity: IdentityEndpoint::Us,
        identity_url: Some(format!("{}/v2.0/", server.uri())),
        request_timeout_secs: 5,
        retry_delay_ms: 1,
    }
}

async fn mount_identity(server: &MockServer) {
    let catalog = json!({
        "access": {
            "token": { "id": "wire-token", "expires": "2030-01-01T00:00:00Z" },
            "serviceCatalog": [
                { "name": "cloudFiles", "endpoints": [ { "region": "IAD", "publicURL": format!("{}/v1/acct", server.uri()) } ] },
                { "name": "cloudFilesCDN", "endpoints": [ { "region": "IAD", "publicURL": format!("{}/cdn/acct", server.uri()) } ] }
            ]
        }
    });

    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .and(body_json(json!({
            "auth": { "RAX-KSKEY:apiKeyCredentials": { "username": "wire-user", "apiKey": "wire-key" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_session_against_mock_server() {
    let server = MockServer::start().await;
    mount_identity(&server).await;

    Mock::given(method("PUT"))
        .and(path("/v1/acct/site%20assets/index.html"))
        .and(header("X-Auth-Token", "wire-token"))
        .and(header("Access-Control-Allow-Origin", "*"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/acct/site%20assets/index.html"))
        .and(header("X-Auth-Token", "wire-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>hi</h1>"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/cdn/acct/site%20assets"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("X-Cdn-Ssl-Uri", "https://abc.ssl.cf5.rackcdn.com")
                .insert_header("X-Cdn-Uri", "http://abc.r5.cf5.rackcdn.com"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let connection = CloudFilesClient::from_config(&config_for(&server))
        .await
        .expect("http client builds");
    assert!(connection.is_authenticated());
    let client = connection.into_client();

    assert!(client.upload_from_string("index.html", "<h1>hi</h1>", true).await);
    assert_eq!(client.get_object_as_string("index.html").await, "<h1>hi</h1>");
    assert_eq!(
        client.https_url_for_object("index.html").await.as_deref(),
        Some("https://abc.ssl.cf5.rackcdn.com/index.html")
    );
    assert_eq!(
        client.http_url_for_object("index.html").await.as_deref(),
        Some("http://abc.r5.cf5.rackcdn.com/index.html")
    );
}

#[tokio::test]
async fn delete_retries_once_over_the_wire() {
    let server = MockServer::start().await;
    mount_identity(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/v1/acct/site%20assets/stale.css"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/acct/site%20assets/stale.css"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = CloudFilesClient::from_config(&config_for(&server))
        .await
        .expect("http client builds")
        .into_client();

    let response = client.delete_object("stale.css").await;
    assert_eq!(response.map(|r| r.status), Some(StatusCode::NO_CONTENT));
}

#[tokio::test]
async fn unauthorized_identity_response_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"unauthorized\":{}}"))
        .expect(1)
        .mount(&server)
        .await;

    let connection = CloudFilesClient::from_config(&config_for(&server))
        .await
        .expect("http client builds");
    assert!(matches!(
        connection.into_result(),
        Err(StorageError::AuthRejected(StatusCode::UNAUTHORIZED))
    ));
}

#[tokio::test]
async fn malformed_identity_body_is_an_unexpected_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": {} })))
        .mount(&server)
        .await;

    let connection = CloudFilesClient::from_config(&config_for(&server))
        .await
        .expect("http client builds");
    assert!(matches!(
        connection.into_result(),
        Err(StorageError::UnexpectedResponse(_))
    ));
}
