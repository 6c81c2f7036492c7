//! Flat-file backend: a JSON metadata index plus one blob per file.
//!
//! Layout under the data directory:
//! ```text
//! {data_dir}/
//! ├── index.json   node metadata and the next id
//! ├── users.json   accounts and the next user id
//! └── blobs/       file payloads, see BlobStorage
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::blob::{write_atomic, BlobStorage};
use super::tree::{self, NodeLink};
use super::user::username_taken;
use super::{FileStore, NewNode, NewUser, Node, NodeUpdate, SearchFilter, User, UserStore};
use crate::{CloudboxError, Result};

const INDEX_FILE: &str = "index.json";
const USERS_FILE: &str = "users.json";
const BLOB_DIR: &str = "blobs";

fn first_id() -> i64 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeIndex {
    #[serde(default = "first_id")]
    next_id: i64,
    #[serde(default)]
    nodes: Vec<Node>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIndex {
    #[serde(default = "first_id")]
    next_id: i64,
    #[serde(default)]
    users: Vec<User>,
}

/// In-memory mirror of both index files. Nodes carry no content here.
#[derive(Debug)]
struct DiskState {
    nodes: BTreeMap<i64, Node>,
    next_id: i64,
    users: BTreeMap<i64, User>,
    next_user_id: i64,
}

/// Store persisting metadata as JSON and payloads as individual files.
///
/// A single async mutex serializes every read-modify-write of the index, so
/// concurrent requests in this process cannot lose each other's updates.
/// Recursive deletes are not crash-atomic.
#[derive(Debug)]
pub struct DiskStore {
    data_dir: PathBuf,
    blobs: BlobStorage,
    state: Mutex<DiskState>,
}

impl DiskStore {
    /// Open the store in `data_dir`, creating it on first use and loading
    /// any existing index.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        info!("Opening file store at {:?}", data_dir);
        fs::create_dir_all(&data_dir).await?;

        let blobs = BlobStorage::new(data_dir.join(BLOB_DIR)).await?;
        let nodes: Option<NodeIndex> = read_json(&data_dir.join(INDEX_FILE)).await?;
        let users: Option<UserIndex> = read_json(&data_dir.join(USERS_FILE)).await?;

        let (node_map, next_id) = match nodes {
            Some(index) => {
                let next = index.next_id;
                (index.nodes.into_iter().map(|n| (n.id, n)).collect(), next)
            }
            None => (BTreeMap::new(), first_id()),
        };
        let (user_map, next_user_id) = match users {
            Some(index) => {
                let next = index.next_id;
                (index.users.into_iter().map(|u| (u.id, u)).collect(), next)
            }
            None => (BTreeMap::new(), first_id()),
        };

        let mut state = DiskState {
            nodes: node_map,
            next_id,
            users: user_map,
            next_user_id,
        };
        // Never hand out an id that is already on disk, even if the counter was lost.
        if let Some(max) = state.nodes.keys().next_back() {
            state.next_id = state.next_id.max(max + 1);
        }
        if let Some(max) = state.users.keys().next_back() {
            state.next_user_id = state.next_user_id.max(max + 1);
        }

        debug!(
            nodes = state.nodes.len(),
            users = state.users.len(),
            "file store index loaded"
        );

        Ok(Self {
            data_dir,
            blobs,
            state: Mutex::new(state),
        })
    }

    /// Directory holding the index files and blobs.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn persist_nodes(&self, state: &DiskState) -> Result<()> {
        self.write_node_index(&state.nodes, state.next_id).await
    }

    /// Write `nodes` as the index without touching the in-memory state.
    async fn write_node_index(&self, nodes: &BTreeMap<i64, Node>, next_id: i64) -> Result<()> {
        let index = NodeIndex {
            next_id,
            nodes: nodes.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&index)?;
        write_atomic(&self.data_dir.join(INDEX_FILE), &bytes).await
    }

    async fn persist_users(&self, state: &DiskState) -> Result<()> {
        let index = UserIndex {
            next_id: state.next_user_id,
            users: state.users.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&index)?;
        write_atomic(&self.data_dir.join(USERS_FILE), &bytes).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl FileStore for DiskStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn list(&self, parent_id: Option<i64>) -> Result<Vec<Node>> {
        let state = self.state.lock().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| n.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Node> {
        let state = self.state.lock().await;
        let mut node = state
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))?;

        if node.is_file() {
            node.content = self.blobs.load(id).await?;
        }
        Ok(node)
    }

    async fn metadata(&self, id: i64) -> Result<Node> {
        let state = self.state.lock().await;
        state
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))
    }

    async fn create(&self, new_node: NewNode) -> Result<Node> {
        new_node.validate()?;

        let mut state = self.state.lock().await;
        tree::ensure_parent_folder(new_node.parent_id, |pid| {
            state.nodes.get(&pid).map(NodeLink::from)
        })?;

        let id = state.next_id;
        let node = new_node.into_node(id, Utc::now());
        if node.is_file() {
            self.blobs.save(id, &node.content).await?;
        }

        state.next_id += 1;
        state.nodes.insert(id, node.clone().without_content());
        if let Err(e) = self.persist_nodes(&state).await {
            state.nodes.remove(&id);
            state.next_id -= 1;
            if let Err(cleanup) = self.blobs.delete(id).await {
                warn!(id, error = %cleanup, "failed to remove orphaned blob");
            }
            return Err(e);
        }

        debug!(id, name = %node.name, is_folder = node.is_folder, "created node");
        Ok(node)
    }

    async fn update(&self, id: i64, update: NodeUpdate) -> Result<Node> {
        let mut state = self.state.lock().await;
        let previous = state
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))?;

        update.validate_for(&previous)?;
        if let Some(new_parent) = update.parent_id {
            let link_of = |nid: i64| state.nodes.get(&nid).map(NodeLink::from);
            tree::ensure_parent_folder(new_parent, link_of)?;
            tree::ensure_no_cycle(id, new_parent, link_of)?;
        }

        let replaces_content = update.content.is_some();
        let mut node = previous.clone();
        update.apply_to(&mut node);

        // The old payload is kept until the index names the new size.
        let mut old_content = None;
        if node.is_file() {
            if replaces_content {
                old_content = match self.blobs.load(id).await {
                    Ok(bytes) => Some(bytes),
                    Err(CloudboxError::NotFound(_)) => None,
                    Err(e) => return Err(e),
                };
                self.blobs.save(id, &node.content).await?;
            } else {
                node.content = self.blobs.load(id).await?;
            }
        }

        let mut nodes = state.nodes.clone();
        nodes.insert(id, node.clone().without_content());
        if let Err(e) = self.write_node_index(&nodes, state.next_id).await {
            if let Some(old) = old_content {
                if let Err(restore) = self.blobs.save(id, &old).await {
                    warn!(id, error = %restore, "failed to restore previous blob");
                }
            }
            return Err(e);
        }
        state.nodes = nodes;
        Ok(node)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.nodes.contains_key(&id) {
            return Ok(());
        }

        let children = tree::children_index(state.nodes.values());
        let order = tree::post_order(id, |nid| children.get(&nid).cloned().unwrap_or_default());

        let mut nodes = state.nodes.clone();
        let mut removed_files = Vec::new();
        for nid in &order {
            if let Some(node) = nodes.remove(nid) {
                if node.is_file() {
                    removed_files.push(*nid);
                }
            }
        }

        // Payloads go only once the index no longer lists them.
        self.write_node_index(&nodes, state.next_id).await?;
        state.nodes = nodes;

        for nid in removed_files {
            if let Err(e) = self.blobs.delete(nid).await {
                warn!(id = nid, error = %e, "failed to remove blob, continuing");
            }
        }
        debug!(id, removed = order.len(), "deleted subtree");
        Ok(())
    }

    async fn total_size(&self) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| n.is_file())
            .map(|n| n.size)
            .sum())
    }

    async fn search(&self, filter: &SearchFilter) -> Result<Vec<Node>> {
        let state = self.state.lock().await;
        Ok(state
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let state = self.state.lock().await;
        self.persist_nodes(&state).await?;
        self.persist_users(&state).await?;
        if let Err(e) = self.blobs.cleanup_empty_dirs().await {
            warn!(error = %e, "failed to prune empty blob directories");
        }
        info!("file store at {:?} closed", self.data_dir);
        Ok(())
    }
}

impl UserStore for DiskStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&new_user.username))
        {
            return Err(username_taken(&new_user.username));
        }

        let id = state.next_user_id;
        let user = new_user.into_user(id, Utc::now());
        state.next_user_id += 1;
        state.users.insert(id, user.clone());
        if let Err(e) = self.persist_users(&state).await {
            state.users.remove(&id);
            state.next_user_id -= 1;
            return Err(e);
        }
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }
}
