//! The file store: a tree of files and folders with content, usage
//! accounting and search, behind one trait with three backends.
//!
//! - [`MemoryStore`]: everything in process memory
//! - [`DiskStore`]: JSON metadata index plus one blob file per file
//! - [`SqliteStore`]: metadata and content in SQLite
//!
//! The backend is picked once at startup; the HTTP layer is generic over it.

mod blob;
mod disk;
mod filter;
mod memory;
mod node;
mod sqlite;
pub mod tree;
mod user;

#[cfg(test)]
mod conformance;

pub use blob::BlobStorage;
pub use disk::DiskStore;
pub use filter::SearchFilter;
pub use memory::MemoryStore;
pub use node::{guess_mime_type, NewNode, Node, NodeUpdate, FOLDER_MIME_TYPE, MAX_NAME_LENGTH};
pub use sqlite::SqliteStore;
pub use user::{NewUser, User};

use std::future::Future;

use crate::Result;

/// CRUD on nodes, total-size accounting and search.
///
/// Results of [`list`](FileStore::list) and [`search`](FileStore::search)
/// carry metadata only; [`get`](FileStore::get) is the one operation that
/// loads content. Quota enforcement is left to the caller.
pub trait FileStore: Send + Sync {
    /// `"memory"`, `"file"` or `"sqlite"`.
    fn backend_name(&self) -> &'static str;

    /// Direct children of `parent_id` (`None` for the root) in insertion order.
    /// An unknown parent yields an empty list.
    fn list(&self, parent_id: Option<i64>) -> impl Future<Output = Result<Vec<Node>>> + Send;

    /// The node with its content, or `NotFound`.
    fn get(&self, id: i64) -> impl Future<Output = Result<Node>> + Send;

    /// The node without its content, or `NotFound`.
    fn metadata(&self, id: i64) -> impl Future<Output = Result<Node>> + Send;

    /// Store a new node and return it with its assigned id.
    ///
    /// The parent, if any, must be an existing folder.
    fn create(&self, node: NewNode) -> impl Future<Output = Result<Node>> + Send;

    /// Merge `update` into node `id` and return the result with content.
    ///
    /// Fails with `NotFound` for an unknown id and with `Validation` for
    /// content on a folder, a missing parent, or a move that would create a cycle.
    fn update(&self, id: i64, update: NodeUpdate) -> impl Future<Output = Result<Node>> + Send;

    /// Remove node `id` and, for folders, everything beneath it, children
    /// first. Unknown ids succeed without effect.
    fn delete(&self, id: i64) -> impl Future<Output = Result<()>> + Send;

    /// Sum of the sizes of all files.
    fn total_size(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Files satisfying every predicate of `filter`, in insertion order.
    fn search(&self, filter: &SearchFilter) -> impl Future<Output = Result<Vec<Node>>> + Send;

    /// Release backend resources. The store must not be used afterwards.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Account persistence for the authenticated variant.
pub trait UserStore: Send + Sync {
    /// Store a new account; `Conflict` when the username is taken
    /// (case-insensitively).
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User>> + Send;

    fn get_user(&self, id: i64) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Case-insensitive lookup.
    fn get_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>>> + Send;
}

/// Everything the HTTP layer needs from a backend.
pub trait Backend: FileStore + UserStore + 'static {}

impl<T: FileStore + UserStore + 'static> Backend for T {}
