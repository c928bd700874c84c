//! Property catalog handlers
//!
//! Reads are public; create, update and delete require an admin.

use crate::auth::models::MessageResponse;
use crate::catalog::FormData;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, rejection::QueryRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use estate_core::{Page, Property, PropertyFilter, PropertyType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// Listing filters and pagination
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PropertyQuery {
    /// Region id
    pub region: Option<String>,
    /// `House` or `Land`
    pub property_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// 1-based page, default 1
    pub page: Option<u32>,
    /// Page size, default 20, max 100
    pub limit: Option<u32>,
}

impl PropertyQuery {
    pub fn into_filter(self) -> Result<PropertyFilter, AppError> {
        let defaults = PropertyFilter::default();

        let property_type = self
            .property_type
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.parse::<PropertyType>())
            .transpose()
            .map_err(|_| AppError::BadRequest("propertyType must be House or Land".to_string()))?;

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(AppError::BadRequest(
                    "minPrice cannot exceed maxPrice".to_string(),
                ));
            }
        }

        Ok(PropertyFilter {
            region: self.region.filter(|r| !r.trim().is_empty()),
            property_type,
            min_price: self.min_price,
            max_price: self.max_price,
            page: self.page.unwrap_or(defaults.page).max(1),
            limit: self
                .limit
                .unwrap_or(defaults.limit)
                .clamp(1, PropertyFilter::MAX_LIMIT),
        })
    }
}

pub(crate) fn parse_query(
    query: Result<Query<PropertyQuery>, QueryRejection>,
) -> Result<PropertyFilter, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    query.into_filter()
}

pub(crate) async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FormData, AppError> {
    FormData::read(multipart?).await
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PropertyListResponse {
    pub properties: Vec<Property>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl From<Page<Property>> for PropertyListResponse {
    fn from(page: Page<Property>) -> Self {
        Self {
            properties: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PropertyResponse {
    pub message: String,
    pub property: Property,
}

/// List properties, newest first
#[utoipa::path(
    get,
    path = "/admin/properties",
    tag = "properties",
    params(PropertyQuery),
    responses(
        (status = 200, description = "A page of properties", body = PropertyListResponse),
        (status = 400, description = "Invalid filter", body = crate::error::ApiError),
    )
)]
pub async fn list_properties(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PropertyQuery>, QueryRejection>,
) -> Result<Json<PropertyListResponse>, AppError> {
    let filter = parse_query(query)?;
    let page = state.catalog.list_properties(&filter).await?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/admin/properties/{id}",
    tag = "properties",
    params(("id" = String, Path, description = "Property id")),
    responses(
        (status = 200, description = "The property", body = Property),
        (status = 404, description = "Property not found", body = crate::error::ApiError),
    )
)]
pub async fn get_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Property>, AppError> {
    Ok(Json(state.catalog.get_property(&id).await?))
}

/// Create a listing from a multipart form with 1 to 5 `images` parts
///
/// House listings also need beds, baths, furnished, propertyDetails and
/// features.
#[utoipa::path(
    post,
    path = "/admin/properties",
    tag = "properties",
    security(("bearer_auth" = [])),
    request_body(content = Object, content_type = "multipart/form-data", description = "Listing fields and images"),
    responses(
        (status = 201, description = "Property created", body = PropertyResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "Region not found", body = crate::error::ApiError),
        (status = 502, description = "Image upload failed", body = crate::error::ApiError),
    )
)]
pub async fn create_property(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;
    let property = state.catalog.create_property(form).await?;

    Ok((
        StatusCode::CREATED,
        Json(PropertyResponse {
            message: "Property created".to_string(),
            property,
        }),
    ))
}

/// Update a listing; submitted fields replace stored ones and new images
/// are appended
#[utoipa::path(
    put,
    path = "/admin/properties/{id}",
    tag = "properties",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Property id")),
    request_body(content = Object, content_type = "multipart/form-data", description = "Changed fields and extra images"),
    responses(
        (status = 200, description = "Property updated", body = PropertyResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::error::ApiError),
        (status = 404, description = "Property or region not found", body = crate::error::ApiError),
    )
)]
pub async fn update_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PropertyResponse>, AppError> {
    let form = read_form(multipart).await?;
    let property = state.catalog.update_property(&id, form).await?;

    Ok(Json(PropertyResponse {
        message: "Property updated".to_string(),
        property,
    }))
}

#[utoipa::path(
    delete,
    path = "/admin/properties/{id}",
    tag = "properties",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Property id")),
    responses(
        (status = 200, description = "Property deleted", body = MessageResponse),
        (status = 404, description = "Property not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.catalog.delete_property(&id).await?;
    Ok(Json(MessageResponse::new("Property deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let filter = PropertyQuery::default().into_filter().unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 20);
        assert!(filter.property_type.is_none());
    }

    #[test]
    fn test_query_clamps_pagination() {
        let filter = PropertyQuery {
            page: Some(0),
            limit: Some(1000),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, PropertyFilter::MAX_LIMIT);
    }

    #[test]
    fn test_query_rejects_inverted_price_range() {
        let query = PropertyQuery {
            min_price: Some(500.0),
            max_price: Some(100.0),
            ..Default::default()
        };
        assert!(matches!(query.into_filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_query_parses_type() {
        let filter = PropertyQuery {
            property_type: Some("land".to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.property_type, Some(PropertyType::Land));
    }
}
