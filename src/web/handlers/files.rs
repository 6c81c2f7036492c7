//! File and folder handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{parse_id, AppState};
use crate::quota::StorageSummary;
use crate::store::Backend;
use crate::web::dto::{
    CreateFileRequest, ListQuery, NodeResponse, SearchQuery, SuccessResponse, UpdateFileRequest,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::OptionalAuthUser;

/// GET /api/files - List the children of a folder, or the root.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(ListQuery),
    responses(
        (status = 200, description = "Direct children, metadata only", body = Vec<NodeResponse>),
        (status = 400, description = "parentId is not an integer"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_files<S: Backend>(
    State(state): State<AppState<S>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NodeResponse>>, ApiError> {
    let parent_id = query.parent()?;
    let nodes = state.store.list(parent_id).await?;
    Ok(Json(NodeResponse::from_nodes(nodes)))
}

/// GET /api/files/:id - Fetch one node with its content.
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "Node ID")
    ),
    responses(
        (status = 200, description = "The node with base64 content", body = NodeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_file<S: Backend>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<NodeResponse>, ApiError> {
    let id = parse_id(&id)?;
    let node = state.store.get(id).await?;
    Ok(Json(node.into()))
}

/// POST /api/files - Upload a file or create a folder.
#[utoipa::path(
    post,
    path = "/api/files",
    tag = "files",
    request_body = CreateFileRequest,
    responses(
        (status = 201, description = "Created node", body = NodeResponse),
        (status = 400, description = "File too large or storage limit exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Request body too large"),
        (status = 422, description = "Invalid name, content or parent")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_file<S: Backend>(
    State(state): State<AppState<S>>,
    caller: OptionalAuthUser,
    ValidatedJson(req): ValidatedJson<CreateFileRequest>,
) -> Result<(StatusCode, Json<NodeResponse>), ApiError> {
    let mut new_node = req.into_new_node()?;
    if let Some(owner_id) = caller.user_id() {
        new_node = new_node.with_owner(owner_id);
    }

    if !new_node.is_folder {
        let used = state.store.total_size().await?;
        state
            .quota
            .check_upload(used, new_node.content.len() as u64)?;
    }

    let node = state.store.create(new_node).await?;
    tracing::info!(
        id = node.id,
        name = %node.name,
        size = node.size,
        is_folder = node.is_folder,
        "Node created"
    );

    Ok((StatusCode::CREATED, Json(node.into())))
}

/// PATCH /api/files/:id - Rename, move or replace content.
#[utoipa::path(
    patch,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "Node ID")
    ),
    request_body = UpdateFileRequest,
    responses(
        (status = 200, description = "Updated node", body = NodeResponse),
        (status = 400, description = "Storage limit exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found"),
        (status = 422, description = "Invalid update")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_file<S: Backend>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateFileRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let id = parse_id(&id)?;
    let update = req.into_update()?;

    if let Some(new_size) = update.new_size() {
        let current = state.store.metadata(id).await?;
        if current.is_file() {
            let used = state.store.total_size().await?;
            state.quota.check_replace(used, current.size, new_size)?;
        }
    }

    let node = state.store.update(id, update).await?;
    tracing::info!(id = node.id, name = %node.name, "Node updated");

    Ok(Json(node.into()))
}

/// DELETE /api/files/:id - Delete a node and everything beneath it.
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "Node ID")
    ),
    responses(
        (status = 200, description = "Deleted, or never existed", body = SuccessResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_file<S: Backend>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete(id).await?;
    tracing::info!(id, "Node deleted");
    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/files/search - Find files by name, type, size and date.
#[utoipa::path(
    get,
    path = "/api/files/search",
    tag = "files",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching files, metadata only", body = Vec<NodeResponse>),
        (status = 400, description = "Invalid size or date"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn search_files<S: Backend>(
    State(state): State<AppState<S>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<NodeResponse>>, ApiError> {
    let filter = query.into_filter()?;
    let nodes = state.store.search(&filter).await?;
    tracing::debug!(?filter, matches = nodes.len(), "Search");
    Ok(Json(NodeResponse::from_nodes(nodes)))
}

/// GET /api/storage - Storage usage against the limit.
#[utoipa::path(
    get,
    path = "/api/storage",
    tag = "storage",
    responses(
        (status = 200, description = "Usage summary", body = StorageSummary),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn storage_summary<S: Backend>(
    State(state): State<AppState<S>>,
) -> Result<Json<StorageSummary>, ApiError> {
    let used = state.store.total_size().await?;
    Ok(Json(state.quota.summary(used)))
}
