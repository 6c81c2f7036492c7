//! File and folder nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CloudboxError, Result};

/// MIME type recorded on every folder.
pub const FOLDER_MIME_TYPE: &str = "folder";

/// Maximum length of a node name in characters.
pub const MAX_NAME_LENGTH: usize = 255;

/// A file or folder in the tree.
///
/// The serde form is the metadata record kept in the flat-file index, so
/// `content` never goes through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique, sequential id.
    pub id: i64,
    /// Display name. Duplicates are allowed, even within one folder.
    pub name: String,
    /// Breadcrumb such as `/Docs/a.txt`. Informational only.
    pub path: String,
    /// Content length in bytes; always 0 for folders.
    pub size: u64,
    /// MIME type, `"folder"` for folders.
    pub mime_type: String,
    /// Raw payload. Empty for folders and for metadata-only results.
    #[serde(skip)]
    pub content: Vec<u8>,
    /// Containing folder, `None` for the root.
    pub parent_id: Option<i64>,
    /// Whether this node is a folder.
    pub is_folder: bool,
    /// Creation time, set once.
    pub created_at: DateTime<Utc>,
    /// Owning user when authentication is enabled.
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl Node {
    /// Whether this node is a regular file.
    pub fn is_file(&self) -> bool {
        !self.is_folder
    }

    /// The same node with the payload dropped.
    pub fn without_content(mut self) -> Self {
        self.content = Vec::new();
        self
    }
}

/// Data for creating a node.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub name: String,
    /// Empty means `/{name}`.
    pub path: String,
    /// Empty means guessed from the name for files, `"folder"` for folders.
    pub mime_type: String,
    pub content: Vec<u8>,
    pub parent_id: Option<i64>,
    pub is_folder: bool,
    pub owner_id: Option<i64>,
}

impl NewNode {
    /// A file with the given payload.
    pub fn file(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// An empty folder.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: true,
            ..Default::default()
        }
    }

    /// Place the node inside a folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the breadcrumb path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Record the owning user.
    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Check the fields that do not depend on other nodes.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.is_folder && !self.content.is_empty() {
            return Err(CloudboxError::Validation(
                "folders cannot carry content".to_string(),
            ));
        }
        Ok(())
    }

    /// Materialize the node under `id`, deriving size, path and MIME type.
    pub fn into_node(self, id: i64, created_at: DateTime<Utc>) -> Node {
        let path = if self.path.is_empty() {
            format!("/{}", self.name)
        } else {
            self.path
        };
        let mime_type = if self.is_folder {
            FOLDER_MIME_TYPE.to_string()
        } else if self.mime_type.is_empty() {
            guess_mime_type(&self.name)
        } else {
            self.mime_type
        };

        Node {
            id,
            name: self.name,
            path,
            size: self.content.len() as u64,
            mime_type,
            content: self.content,
            parent_id: self.parent_id,
            is_folder: self.is_folder,
            created_at,
            owner_id: self.owner_id,
        }
    }
}

/// Partial update of a node. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub path: Option<String>,
    pub mime_type: Option<String>,
    /// Replacement payload; the size is re-derived from it.
    pub content: Option<Vec<u8>>,
    /// `Some(None)` moves the node to the root.
    pub parent_id: Option<Option<i64>>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the breadcrumb path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the MIME type.
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Replace the payload.
    pub fn content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Move under another folder, or to the root with `None`.
    pub fn parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.path.is_none()
            && self.mime_type.is_none()
            && self.content.is_none()
            && self.parent_id.is_none()
    }

    /// Size of the replacement payload, if any.
    pub fn new_size(&self) -> Option<u64> {
        self.content.as_ref().map(|c| c.len() as u64)
    }

    /// Check the update against the node it targets.
    pub fn validate_for(&self, node: &Node) -> Result<()> {
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if node.is_folder {
            if self.content.is_some() {
                return Err(CloudboxError::Validation(
                    "folders cannot carry content".to_string(),
                ));
            }
            if matches!(self.mime_type.as_deref(), Some(m) if m != FOLDER_MIME_TYPE) {
                return Err(CloudboxError::Validation(
                    "the MIME type of a folder cannot be changed".to_string(),
                ));
            }
        }
        if self.parent_id == Some(Some(node.id)) {
            return Err(CloudboxError::Validation(
                "a node cannot be its own parent".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge the set fields into `node`. Identity fields are never touched.
    pub fn apply_to(self, node: &mut Node) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(path) = self.path {
            node.path = path;
        }
        if let Some(mime_type) = self.mime_type {
            node.mime_type = if mime_type.is_empty() && node.is_file() {
                guess_mime_type(&node.name)
            } else {
                mime_type
            };
        }
        if let Some(content) = self.content {
            node.size = content.len() as u64;
            node.content = content;
        }
        if let Some(parent_id) = self.parent_id {
            node.parent_id = parent_id;
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CloudboxError::Validation(
            "name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CloudboxError::Validation(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    if name.contains('/') || name.chars().any(char::is_control) {
        return Err(CloudboxError::Validation(
            "name must not contain '/' or control characters".to_string(),
        ));
    }
    Ok(())
}

/// MIME type inferred from a file name's extension.
pub fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
