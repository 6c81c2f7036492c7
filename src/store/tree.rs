//! Tree walks and structural checks shared by every backend.

use std::collections::{HashMap, HashSet};

use super::Node;
use crate::{CloudboxError, Result};

/// The structural part of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLink {
    pub parent_id: Option<i64>,
    pub is_folder: bool,
}

impl From<&Node> for NodeLink {
    fn from(node: &Node) -> Self {
        Self {
            parent_id: node.parent_id,
            is_folder: node.is_folder,
        }
    }
}

/// Ids of `root` and all of its descendants, children before parents.
///
/// Uses an explicit stack and a visited set, so deep trees cannot overflow
/// the call stack and a corrupted parent chain cannot loop forever.
pub fn post_order<F>(root: i64, mut children_of: F) -> Vec<i64>
where
    F: FnMut(i64) -> Vec<i64>,
{
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root, false)];

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        if !visited.insert(id) {
            continue;
        }
        stack.push((id, true));
        for child in children_of(id).into_iter().rev() {
            if !visited.contains(&child) {
                stack.push((child, false));
            }
        }
    }

    order
}

/// Parent id to child ids, each list in ascending id order.
pub fn children_index<'a, I>(nodes: I) -> HashMap<i64, Vec<i64>>
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut index: HashMap<i64, Vec<i64>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.parent_id {
            index.entry(parent).or_default().push(node.id);
        }
    }
    for children in index.values_mut() {
        children.sort_unstable();
    }
    index
}

/// Reject a parent reference that does not name an existing folder.
pub fn ensure_parent_folder<F>(parent_id: Option<i64>, link_of: F) -> Result<()>
where
    F: Fn(i64) -> Option<NodeLink>,
{
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    match link_of(parent_id) {
        Some(link) if link.is_folder => Ok(()),
        Some(_) => Err(CloudboxError::Validation(format!(
            "parent {parent_id} is not a folder"
        ))),
        None => Err(CloudboxError::Validation(format!(
            "parent folder {parent_id} does not exist"
        ))),
    }
}

/// Reject moving `node_id` under `new_parent` when that parent is the node
/// itself or one of its descendants.
pub fn ensure_no_cycle<F>(node_id: i64, new_parent: Option<i64>, link_of: F) -> Result<()>
where
    F: Fn(i64) -> Option<NodeLink>,
{
    let mut seen = HashSet::new();
    let mut current = new_parent;

    while let Some(id) = current {
        if id == node_id {
            return Err(CloudboxError::Validation(
                "cannot move a folder into itself or one of its descendants".to_string(),
            ));
        }
        if !seen.insert(id) {
            break;
        }
        current = link_of(id).and_then(|link| link.parent_id);
    }

    Ok(())
}
