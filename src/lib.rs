//! cloudbox - cloud file storage over HTTP
//!
//! A tree of files and folders with content, storage accounting and search,
//! kept in memory, on disk or in SQLite, and served as a JSON API.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod quota;
pub mod store;
pub mod web;

pub use config::{Config, StorageBackend};
pub use db::Database;
pub use error::{CloudboxError, Result};
pub use quota::{StorageQuota, StorageSummary};
pub use store::{
    Backend, DiskStore, FileStore, MemoryStore, NewNode, Node, NodeUpdate, SearchFilter,
    SqliteStore, UserStore,
};
pub use web::WebServer;
