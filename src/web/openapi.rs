//! OpenAPI document served at `/api-docs/openapi.json`.

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::quota::StorageSummary;
use crate::web::dto::{
    CreateFileRequest, LoginRequest, NodeResponse, RegisterRequest, SuccessResponse,
    TokenResponse, UpdateFileRequest, UserInfo,
};
use crate::web::handlers::{auth, files};

#[derive(OpenApi)]
#[openapi(
    info(title = "cloudbox", description = "Cloud file storage API"),
    paths(
        files::list_files,
        files::get_file,
        files::create_file,
        files::update_file,
        files::delete_file,
        files::search_files,
        files::storage_summary,
        auth::register,
        auth::login,
        auth::current_user,
        auth::logout,
    ),
    components(schemas(
        NodeResponse,
        CreateFileRequest,
        UpdateFileRequest,
        SuccessResponse,
        StorageSummary,
        RegisterRequest,
        LoginRequest,
        TokenResponse,
        UserInfo,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "files", description = "Files and folders"),
        (name = "storage", description = "Storage usage"),
        (name = "auth", description = "Accounts and sessions, when enabled")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
