//! HTTP API for cloudbox.
//!
//! JSON endpoints over the file store, with optional bearer-token
//! authentication and an OpenAPI document.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
