//! Favorites handlers (any authenticated user)

use crate::auth::models::MessageResponse;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use estate_core::Property;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoritesResponse {
    pub favorites: Vec<Property>,
}

#[utoipa::path(
    get,
    path = "/favorites",
    tag = "favorites",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Favorited properties that still exist", body = FavoritesResponse),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
) -> Result<Json<FavoritesResponse>, AppError> {
    let favorites = state.favorites.list(&current.user_id).await?;
    Ok(Json(FavoritesResponse { favorites }))
}

#[utoipa::path(
    post,
    path = "/favorites/{id}",
    tag = "favorites",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Property id")),
    responses(
        (status = 201, description = "Added to favorites", body = MessageResponse),
        (status = 400, description = "Already a favorite", body = crate::error::ApiError),
        (status = 404, description = "Property not found", body = crate::error::ApiError),
    )
)]
pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(property_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let property = state.favorites.add(&current.user_id, &property_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!(
            "{} added to favorites",
            property.name
        ))),
    ))
}

#[utoipa::path(
    delete,
    path = "/favorites/{id}",
    tag = "favorites",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Property id")),
    responses(
        (status = 200, description = "Removed from favorites", body = MessageResponse),
        (status = 404, description = "Not a favorite", body = crate::error::ApiError),
    )
)]
pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    Path(property_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .favorites
        .remove(&current.user_id, &property_id)
        .await?;
    Ok(Json(MessageResponse::new("Removed from favorites")))
}
