use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::services::{AppServices, SignedIn};
use crate::context::SessionContext;

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SignupRequest>,
) -> Result<axum::response::Response, AppError> {
    let signed_in = services.signup(body).await?;
    Ok(with_session(StatusCode::CREATED, signed_in))
}

pub async fn signin(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SigninRequest>,
) -> Result<axum::response::Response, AppError> {
    let signed_in = services.signin(body).await?;
    Ok(with_session(StatusCode::OK, signed_in))
}

pub async fn signout(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let (message, cookie) = services.signout();
    ([(header::SET_COOKIE, cookie)], Json(message))
}

pub async fn request_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RequestResetRequest>,
) -> Result<Json<dto::SuccessMessage>, AppError> {
    Ok(Json(services.request_reset(body).await?))
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ResetPasswordRequest>,
) -> Result<axum::response::Response, AppError> {
    let signed_in = services.reset_password(body).await?;
    Ok(with_session(StatusCode::OK, signed_in))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(services.me(&session).await?))
}

fn with_session(status: StatusCode, signed_in: SignedIn) -> axum::response::Response {
    (
        status,
        [(header::SET_COOKIE, signed_in.cookie)],
        Json(signed_in.user),
    )
        .into_response()
}
