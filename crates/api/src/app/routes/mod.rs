use axum::{
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod items;
pub mod system;
pub mod users;

/// Router for every session-aware endpoint.
///
/// Anonymous callers reach all of them; the services layer decides which
/// operations need a session.
pub fn router() -> Router {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route("/signout", post(auth::signout))
        .route("/requestReset", post(auth::request_reset))
        .route("/resetPassword", post(auth::reset_password))
        .route("/me", get(auth::me))
        .route("/users", get(users::list_users))
        .route("/updatePermissions", post(users::update_permissions))
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id",
            get(items::get_item)
                .patch(items::update_item)
                .delete(items::delete_item),
        )
}
