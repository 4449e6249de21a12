mod client;
mod urls;

pub use client::{
    HttpInvoker, HttpMethod, InvokerRequest, InvokerResponse, ReqwestInvoker, TransportError,
    APPLICATION_JSON, CLIENT_SECRET, CONTENT_TYPE,
};
pub use urls::{get_base_url, get_service_root, UrlBuilder};
