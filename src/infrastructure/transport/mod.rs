pub mod reqwest_transport;
pub mod traits;

pub use reqwest_transport::ReqwestTransport;
pub use traits::{CallMode, HttpRequest, HttpResponse, HttpTransport};
