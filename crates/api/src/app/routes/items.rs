use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};

use sickfits_infra::{Item, ItemPatch, NewItem};

use crate::app::errors::AppError;
use crate::app::services::AppServices;
use crate::context::SessionContext;

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(services.items().await?))
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(services.item(&id).await?))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let item = services.create_item(&session, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<ItemPatch>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(services.update_item(&session, &id, body).await?))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(services.delete_item(&session, &id).await?))
}
