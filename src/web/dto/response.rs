//! Response DTOs for Web API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::store::{Node, User};

/// A file or folder as served to clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeResponse {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mime_type: String,
    /// Base64 payload. Empty for folders and in listings.
    pub content: String,
    pub parent_id: Option<i64>,
    pub is_folder: bool,
    /// RFC 3339, millisecond precision.
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
}

impl From<Node> for NodeResponse {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            content: STANDARD.encode(&node.content),
            name: node.name,
            path: node.path,
            size: node.size,
            mime_type: node.mime_type,
            parent_id: node.parent_id,
            is_folder: node.is_folder,
            created_at: to_rfc3339(&node.created_at),
            owner_id: node.owner_id,
        }
    }
}

impl NodeResponse {
    /// Convert a batch of store results.
    pub fn from_nodes(nodes: Vec<Node>) -> Vec<Self> {
        nodes.into_iter().map(Self::from).collect()
    }
}

/// Body of a successful delete or logout.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Public view of an account.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub created_at: String,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: to_rfc3339(&user.created_at),
        }
    }
}

/// Login and registration response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Bearer token (JWT).
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    pub user: UserInfo,
}

fn to_rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
