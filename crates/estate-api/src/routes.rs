//! API route definitions

use crate::auth::{require_admin, require_auth};
use crate::catalog::{MAX_IMAGES, MAX_IMAGE_BYTES};
use crate::handlers::{auth, favorites, health, properties, regions, tours};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Room for a full set of images plus the text fields
const MAX_UPLOAD_BODY: usize = MAX_IMAGES * MAX_IMAGE_BYTES + 1024 * 1024;

/// Create API routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/verify-email/:token", get(auth::verify_email_handler))
        .route("/auth/refresh-token", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route(
            "/auth/reset-password/:reset_token",
            post(auth::reset_password_handler),
        )
        // Catalog reads
        .route("/admin/properties", get(properties::list_properties))
        .route("/admin/properties/:id", get(properties::get_property))
        .route("/admin/regions", get(regions::list_regions))
        .route("/admin/regions/:id", get(regions::get_region))
        .route("/admin/regions/:id/properties", get(regions::region_properties));

    // Any authenticated user
    let user_routes = Router::new()
        .route("/auth/profile", get(auth::profile_handler))
        .route("/auth/updateuser", put(auth::update_user_handler))
        .route("/auth/change-password", put(auth::change_password_handler))
        .route("/favorites", get(favorites::list_favorites))
        .route(
            "/favorites/:id",
            post(favorites::add_favorite).delete(favorites::remove_favorite),
        )
        .route("/tours", post(tours::request_tour))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Catalog mutations; require_auth runs before require_admin
    let admin_routes = Router::new()
        .route("/admin/properties", post(properties::create_property))
        .route(
            "/admin/properties/:id",
            put(properties::update_property).delete(properties::delete_property),
        )
        .route("/admin/regions", post(regions::create_region))
        .route(
            "/admin/regions/:id",
            put(regions::update_region).delete(regions::delete_region),
        )
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BODY));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
}
