//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: collaborators and the auth mutation orchestrator
//! - `routes/`: HTTP handlers (one file per area)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: `AppError` and consistent error responses

use std::sync::Arc;

use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use sickfits_auth::{PasswordService, SessionTokenService};
use sickfits_infra::{AppConfig, InMemoryOutbox};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::{AppServices, Backends, ServiceSettings};

/// Build the full HTTP router around ready-made services.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let cors = cors_layer(services.frontend_url());
    let session_state = middleware::SessionState {
        tokens: services.session_tokens(),
    };

    let api = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            session_state,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Credentialed CORS for the storefront origin only.
fn cors_layer(frontend_url: &url::Url) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_credentials(true);

    match HeaderValue::from_str(&frontend_url.origin().ascii_serialization()) {
        Ok(origin) => cors.allow_origin(AllowOrigin::exact(origin)),
        Err(err) => {
            tracing::warn!(%frontend_url, error = %err, "frontend origin unusable; cross-origin requests disabled");
            cors
        }
    }
}

/// Production wiring: backends chosen from `config`, production hashing cost.
pub async fn build_services(config: &AppConfig) -> Result<Arc<AppServices>, errors::AppError> {
    let backends = services::build_backends(config).await?;
    Ok(Arc::new(AppServices::new(
        backends,
        Arc::new(PasswordService::default()),
        Arc::new(SessionTokenService::new(&config.app_secret)),
        ServiceSettings::from_config(config),
    )))
}

/// In-memory wiring with cheap hashing, for tests and local demos.
pub fn build_in_memory_app(config: &AppConfig) -> (Router, Arc<InMemoryOutbox>) {
    let (backends, outbox) = Backends::in_memory();
    let mut settings = ServiceSettings::from_config(config);
    settings.mail_retry.base_delay = std::time::Duration::from_millis(10);

    let services = Arc::new(AppServices::new(
        backends,
        Arc::new(PasswordService::insecure_fast()),
        Arc::new(SessionTokenService::new(&config.app_secret)),
        settings,
    ));
    (build_app(services), outbox)
}
