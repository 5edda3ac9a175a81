use std::sync::Arc;

use axum::{extract::Extension, Json};

use sickfits_auth::UserProfile;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::services::AppServices;
use crate::context::SessionContext;

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(services.users(&session).await?))
}

pub async fn update_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<dto::UpdatePermissionsRequest>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(services.update_permissions(&session, body).await?))
}
