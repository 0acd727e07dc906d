pub mod cloud_files_client;

pub use cloud_files_client::{
    CORS_HEADERS, ClientOptions, CloudFilesClient, Connection, ObjectResponse, SessionStatus,
    UploadRequest,
};
