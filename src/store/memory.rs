//! In-memory backend.

use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::tree::{self, NodeLink};
use super::user::username_taken;
use super::{FileStore, NewNode, NewUser, Node, NodeUpdate, SearchFilter, User, UserStore};
use crate::{CloudboxError, Result};

#[derive(Debug)]
struct Inner {
    nodes: BTreeMap<i64, Node>,
    users: BTreeMap<i64, User>,
    next_id: i64,
    next_user_id: i64,
}

/// Volatile store for tests and throwaway deployments. Ids start at 1.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                nodes: BTreeMap::new(),
                users: BTreeMap::new(),
                next_id: 1,
                next_user_id: 1,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, parent_id: Option<i64>) -> Result<Vec<Node>> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.parent_id == parent_id)
            .map(|n| n.clone().without_content())
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Node> {
        let inner = self.inner.read().await;
        inner
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))
    }

    async fn metadata(&self, id: i64) -> Result<Node> {
        let inner = self.inner.read().await;
        inner
            .nodes
            .get(&id)
            .map(|n| n.clone().without_content())
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))
    }

    async fn create(&self, new_node: NewNode) -> Result<Node> {
        new_node.validate()?;

        let mut inner = self.inner.write().await;
        tree::ensure_parent_folder(new_node.parent_id, |id| {
            inner.nodes.get(&id).map(NodeLink::from)
        })?;

        let id = inner.next_id;
        inner.next_id += 1;
        let node = new_node.into_node(id, Utc::now());
        inner.nodes.insert(id, node.clone());

        debug!(id, name = %node.name, is_folder = node.is_folder, "created node");
        Ok(node)
    }

    async fn update(&self, id: i64, update: NodeUpdate) -> Result<Node> {
        let mut inner = self.inner.write().await;
        let mut node = inner
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| CloudboxError::NotFound(format!("file {id}")))?;

        update.validate_for(&node)?;
        if let Some(new_parent) = update.parent_id {
            let link_of = |nid: i64| inner.nodes.get(&nid).map(NodeLink::from);
            tree::ensure_parent_folder(new_parent, link_of)?;
            tree::ensure_no_cycle(id, new_parent, link_of)?;
        }

        update.apply_to(&mut node);
        inner.nodes.insert(id, node.clone());
        Ok(node)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.nodes.contains_key(&id) {
            return Ok(());
        }

        let children = tree::children_index(inner.nodes.values());
        let order = tree::post_order(id, |nid| children.get(&nid).cloned().unwrap_or_default());
        for nid in &order {
            inner.nodes.remove(nid);
        }

        debug!(id, removed = order.len(), "deleted subtree");
        Ok(())
    }

    async fn total_size(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.is_file())
            .map(|n| n.size)
            .sum())
    }

    async fn search(&self, filter: &SearchFilter) -> Result<Vec<Node>> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .map(|n| n.clone().without_content())
            .collect())
    }

    async fn close(&self) -> Result<()> {
        debug!("memory store closed");
        Ok(())
    }
}

impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&new_user.username))
        {
            return Err(username_taken(&new_user.username));
        }

        let id = inner.next_user_id;
        inner.next_user_id += 1;
        let user = new_user.into_user(id, Utc::now());
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }
}
