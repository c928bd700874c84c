//! Estate API - REST server for the listings service
//!
//! Accounts with email verification, a public property and region catalog
//! with an admin back office, favorites and tour requests.

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod favorites;
pub mod handlers;
pub mod integrations;
pub mod notify;
pub mod routes;
pub mod state;
pub mod tours;

#[cfg(feature = "test-utils")]
pub mod testing;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[cfg(feature = "test-utils")]
pub use testing::create_router_for_testing;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Estate Listings API",
        description = "Property listings, accounts, favorites and tour requests"
    ),
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::verify_email_handler,
        handlers::auth::refresh_handler,
        handlers::auth::logout_handler,
        handlers::auth::profile_handler,
        handlers::auth::update_user_handler,
        handlers::auth::change_password_handler,
        handlers::auth::forgot_password_handler,
        handlers::auth::reset_password_handler,
        handlers::properties::list_properties,
        handlers::properties::get_property,
        handlers::properties::create_property,
        handlers::properties::update_property,
        handlers::properties::delete_property,
        handlers::regions::list_regions,
        handlers::regions::get_region,
        handlers::regions::region_properties,
        handlers::regions::create_region,
        handlers::regions::update_region,
        handlers::regions::delete_region,
        handlers::favorites::list_favorites,
        handlers::favorites::add_favorite,
        handlers::favorites::remove_favorite,
        handlers::tours::request_tour,
    ),
    components(schemas(
        error::ApiError,
        error::FieldError,
        auth::models::RegisterRequest,
        auth::models::LoginRequest,
        auth::models::RefreshRequest,
        auth::models::UpdateUserRequest,
        auth::models::ChangePasswordRequest,
        auth::models::ForgotPasswordRequest,
        auth::models::ResetPasswordRequest,
        auth::models::AuthResponse,
        auth::models::TokenResponse,
        auth::models::UserResponse,
        auth::models::MessageResponse,
        estate_core::UserPublic,
        estate_core::Role,
        estate_core::Region,
        estate_core::Property,
        estate_core::PropertyKind,
        estate_core::PropertyType,
        estate_core::HouseDetails,
        handlers::properties::PropertyListResponse,
        handlers::properties::PropertyResponse,
        handlers::regions::RegionListResponse,
        handlers::regions::RegionResponse,
        handlers::regions::RegionDeleteResponse,
        handlers::favorites::FavoritesResponse,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        tours::TourRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "auth", description = "Accounts and sessions"),
        (name = "properties", description = "Property catalog"),
        (name = "regions", description = "Regions"),
        (name = "favorites", description = "Saved properties"),
        (name = "tours", description = "Viewing requests"),
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

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .allow_origin(AllowOrigin::list(origins)),
    )
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let router = Router::new()
        .merge(routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}
