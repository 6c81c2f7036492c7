//! Request DTOs for Web API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::validation::{node_name, username_chars};
use crate::store::{NewNode, NodeUpdate, SearchFilter};
use crate::web::error::ApiError;

/// Body of `POST /api/files`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    /// Display name.
    #[validate(length(min = 1, max = 255), custom(function = "node_name"))]
    pub name: String,
    /// Breadcrumb path; `/{name}` when absent.
    #[serde(default)]
    pub path: Option<String>,
    /// Declared size. Must match the decoded content when given.
    #[serde(default)]
    pub size: Option<u64>,
    /// MIME type; guessed from the name when empty.
    #[serde(default, alias = "type")]
    pub mime_type: Option<String>,
    /// Base64 payload or `data:` URL.
    #[serde(default)]
    pub content: Option<String>,
    /// Containing folder, absent for the root.
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub is_folder: bool,
}

impl CreateFileRequest {
    /// Decode the payload and build the store's creation record.
    pub fn into_new_node(self) -> Result<NewNode, ApiError> {
        let content = match self.content.as_deref() {
            Some(encoded) if !self.is_folder => decode_content(encoded)?,
            Some(encoded) if !encoded.is_empty() => {
                return Err(ApiError::unprocessable("folders cannot carry content"));
            }
            _ => Vec::new(),
        };
        check_declared_size(self.size, content.len(), self.is_folder)?;

        let mut node = if self.is_folder {
            NewNode::folder(self.name)
        } else {
            NewNode::file(self.name, content)
        };
        if let Some(path) = self.path {
            node = node.with_path(path);
        }
        if let Some(mime_type) = self.mime_type {
            node = node.with_mime_type(mime_type);
        }
        if let Some(parent_id) = self.parent_id {
            node = node.with_parent(parent_id);
        }
        Ok(node)
    }
}

/// Body of `PATCH /api/files/{id}`. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[validate(length(min = 1, max = 255), custom(function = "node_name"))]
    pub name: Option<String>,
    pub path: Option<String>,
    #[serde(default, alias = "type")]
    pub mime_type: Option<String>,
    /// Replacement payload, base64 or `data:` URL.
    pub content: Option<String>,
    /// Declared size of the replacement payload.
    pub size: Option<u64>,
    /// `null` moves the node to the root; absent leaves it in place.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub parent_id: Option<Option<i64>>,
}

impl UpdateFileRequest {
    pub fn into_update(self) -> Result<NodeUpdate, ApiError> {
        let mut update = NodeUpdate::new();
        if let Some(name) = self.name {
            update = update.name(name);
        }
        if let Some(path) = self.path {
            update = update.path(path);
        }
        if let Some(mime_type) = self.mime_type {
            update = update.mime_type(mime_type);
        }
        if let Some(encoded) = self.content.as_deref() {
            let content = decode_content(encoded)?;
            check_declared_size(self.size, content.len(), false)?;
            update = update.content(content);
        }
        if let Some(parent_id) = self.parent_id {
            update = update.parent_id(parent_id);
        }
        Ok(update)
    }
}

/// Distinguish an explicit `null` from an absent field.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// Decode plain base64 or a `data:<mime>;base64,<payload>` URL.
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| ApiError::unprocessable("Malformed data URL"))?,
        None => encoded,
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|_| ApiError::unprocessable("Content is not valid base64"))
}

fn check_declared_size(declared: Option<u64>, actual: usize, is_folder: bool) -> Result<(), ApiError> {
    match declared {
        // Clients send 0 for folders; anything else is ignored for them
        _ if is_folder => Ok(()),
        Some(size) if size != actual as u64 => Err(ApiError::unprocessable(format!(
            "Declared size {size} does not match content length {actual}"
        ))),
        _ => Ok(()),
    }
}

/// Query of `GET /api/files`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Folder id; absent, empty or `null` for the root.
    pub parent_id: Option<String>,
}

impl ListQuery {
    pub fn parent(&self) -> Result<Option<i64>, ApiError> {
        match self.parent_id.as_deref().map(str::trim) {
            None | Some("") | Some("null") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("Invalid parentId: {raw}"))),
        }
    }
}

/// Query of `GET /api/files/search`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Name substring.
    pub q: Option<String>,
    /// Same as `q`; `q` wins when both are given.
    pub name: Option<String>,
    /// MIME type prefix; `all` matches everything.
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
    pub min_size: Option<String>,
    pub max_size: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (inclusive through end of day).
    pub end_date: Option<String>,
}

impl SearchQuery {
    pub fn into_filter(self) -> Result<SearchFilter, ApiError> {
        let mut filter = SearchFilter::new();

        if let Some(name) = non_empty(self.q).or_else(|| non_empty(self.name)) {
            filter = filter.name(name);
        }
        if let Some(prefix) = non_empty(self.mime_type).filter(|t| t != "all") {
            filter = filter.mime_prefix(prefix);
        }
        if let Some(raw) = non_empty(self.min_size) {
            filter = filter.min_size(parse_size("minSize", &raw)?);
        }
        if let Some(raw) = non_empty(self.max_size) {
            filter = filter.max_size(parse_size("maxSize", &raw)?);
        }
        if let Some(raw) = non_empty(self.start_date) {
            filter = filter.start_date(parse_date("startDate", &raw, NaiveTime::MIN)?);
        }
        if let Some(raw) = non_empty(self.end_date) {
            filter = filter.end_date(parse_date("endDate", &raw, end_of_day())?);
        }
        Ok(filter)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_size(field: &str, raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid {field}: {raw}")))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// RFC 3339, or a bare date at `time_of_day` UTC.
fn parse_date(field: &str, raw: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(time_of_day).and_utc())
        .map_err(|_| ApiError::bad_request(format!("Invalid {field}: {raw}")))
}

/// Body of `POST /api/register`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3 to 32 characters"),
        custom(function = "username_chars")
    )]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be 8 to 128 characters"
    ))]
    pub password: String,
}

/// Body of `POST /api/login`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}
