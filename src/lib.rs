//! Client for Rackspace Cloud Files containers.
//!
//! [`CloudFilesClient::connect`] authenticates against the identity service,
//! resolves the region's storage and CDN endpoints and returns a client bound
//! to one container:
//!
//! ```ignore
//! let connection = CloudFilesClient::from_config(&Config::from_env()?).await?;
//! if !connection.is_authenticated() {
//!     tracing::warn!("running with a degraded Cloud Files session");
//! }
//! let client = connection.into_client();
//! client.upload_from_string("hello.txt", "hello", false).await;
//! let url = client.https_url_for_object("hello.txt").await;
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::Config;
pub use domain::{
    errors::StorageError,
    session::{CdnUrls, Credentials, IdentityEndpoint, Session},
};
pub use infrastructure::storage::{
    ClientOptions, CloudFilesClient, Connection, ObjectResponse, SessionStatus, UploadRequest,
};
