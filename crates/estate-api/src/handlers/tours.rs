//! Tour request handler

use crate::auth::models::MessageResponse;
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, ValidatedJson};
use crate::state::AppState;
use crate::tours::TourRequest;
use axum::{extract::State, Extension, Json};
use chrono::Utc;
use std::sync::Arc;

/// Ask for a viewing; the office and the requester are emailed
#[utoipa::path(
    post,
    path = "/tours",
    tag = "tours",
    security(("bearer_auth" = [])),
    request_body = TourRequest,
    responses(
        (status = 200, description = "Tour request sent", body = MessageResponse),
        (status = 400, description = "Malformed or past date/time", body = crate::error::ApiError),
        (status = 404, description = "Property not found", body = crate::error::ApiError),
    )
)]
pub async fn request_tour(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<TourRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let today = Utc::now().date_naive();
    state
        .tours
        .request(&current.user_id, request, today)
        .await?;
    Ok(Json(MessageResponse::new("Tour request sent")))
}
