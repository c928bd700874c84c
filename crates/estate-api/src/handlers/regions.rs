//! Region handlers

use super::properties::{parse_query, read_form, PropertyListResponse, PropertyQuery};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, rejection::QueryRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use estate_core::Region;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionListResponse {
    pub regions: Vec<Region>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionResponse {
    pub message: String,
    pub region: Region,
}

/// Properties left pointing at the deleted region are counted, not touched
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegionDeleteResponse {
    pub message: String,
    pub orphaned_properties: u64,
}

#[utoipa::path(
    get,
    path = "/admin/regions",
    tag = "regions",
    responses((status = 200, description = "All regions", body = RegionListResponse))
)]
pub async fn list_regions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RegionListResponse>, AppError> {
    let regions = state.catalog.list_regions().await?;
    Ok(Json(RegionListResponse { regions }))
}

#[utoipa::path(
    get,
    path = "/admin/regions/{id}",
    tag = "regions",
    params(("id" = String, Path, description = "Region id")),
    responses(
        (status = 200, description = "The region", body = Region),
        (status = 404, description = "Region not found", body = crate::error::ApiError),
    )
)]
pub async fn get_region(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Region>, AppError> {
    Ok(Json(state.catalog.get_region(&id).await?))
}

#[utoipa::path(
    get,
    path = "/admin/regions/{id}/properties",
    tag = "regions",
    params(("id" = String, Path, description = "Region id"), PropertyQuery),
    responses(
        (status = 200, description = "Properties in the region", body = PropertyListResponse),
        (status = 404, description = "Region not found", body = crate::error::ApiError),
    )
)]
pub async fn region_properties(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    query: Result<Query<PropertyQuery>, QueryRejection>,
) -> Result<Json<PropertyListResponse>, AppError> {
    let filter = parse_query(query)?;
    let page = state.catalog.region_properties(&id, filter).await?;
    Ok(Json(page.into()))
}

/// Create a region from `city` and a single `image` part
#[utoipa::path(
    post,
    path = "/admin/regions",
    tag = "regions",
    security(("bearer_auth" = [])),
    request_body(content = Object, content_type = "multipart/form-data", description = "city and image"),
    responses(
        (status = 201, description = "Region created", body = RegionResponse),
        (status = 400, description = "Missing fields or duplicate city", body = crate::error::ApiError),
        (status = 502, description = "Image upload failed", body = crate::error::ApiError),
    )
)]
pub async fn create_region(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;
    let region = state.catalog.create_region(form).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegionResponse {
            message: "Region created".to_string(),
            region,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/admin/regions/{id}",
    tag = "regions",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Region id")),
    request_body(content = Object, content_type = "multipart/form-data", description = "New city and/or image"),
    responses(
        (status = 200, description = "Region updated", body = RegionResponse),
        (status = 400, description = "Nothing to update or duplicate city", body = crate::error::ApiError),
        (status = 404, description = "Region not found", body = crate::error::ApiError),
    )
)]
pub async fn update_region(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RegionResponse>, AppError> {
    let form = read_form(multipart).await?;
    let region = state.catalog.update_region(&id, form).await?;

    Ok(Json(RegionResponse {
        message: "Region updated".to_string(),
        region,
    }))
}

#[utoipa::path(
    delete,
    path = "/admin/regions/{id}",
    tag = "regions",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Region id")),
    responses(
        (status = 200, description = "Region deleted", body = RegionDeleteResponse),
        (status = 404, description = "Region not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_region(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RegionDeleteResponse>, AppError> {
    let removal = state.catalog.delete_region(&id).await?;

    Ok(Json(RegionDeleteResponse {
        message: format!("Region {} deleted", removal.region.city),
        orphaned_properties: removal.orphaned_properties,
    }))
}
