//! Tour requests
//!
//! A request is checked and forwarded by email; nothing is stored.

use crate::error::{AppError, FieldError};
use crate::notify::Notifier;
use chrono::{NaiveDate, NaiveTime};
use estate_core::{CatalogStore, UserStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TourRequest {
    #[validate(length(min = 1, message = "Property id is required"))]
    pub property_id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    #[validate(length(max = 1000, message = "Message is limited to 1000 characters"))]
    pub message: Option<String>,
}

/// Parse the requested slot; the date may be today but not earlier
pub fn parse_slot(
    date: &str,
    time: &str,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveTime), AppError> {
    let mut errors = Vec::new();

    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| errors.push(FieldError::new("date", "Date must be YYYY-MM-DD")))
        .ok();
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| errors.push(FieldError::new("time", "Time must be HH:MM")))
        .ok();

    match (date, time) {
        (Some(date), Some(_)) if date < today => Err(AppError::BadRequest(
            "Tour date cannot be in the past".to_string(),
        )),
        (Some(date), Some(time)) => Ok((date, time)),
        _ => Err(AppError::Validation(errors)),
    }
}

pub struct TourService {
    users: Arc<dyn UserStore>,
    catalog: Arc<dyn CatalogStore>,
    notifier: Arc<Notifier>,
}

impl TourService {
    pub fn new(
        users: Arc<dyn UserStore>,
        catalog: Arc<dyn CatalogStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            users,
            catalog,
            notifier,
        }
    }

    pub async fn request(
        &self,
        user_id: &str,
        request: TourRequest,
        today: NaiveDate,
    ) -> Result<(), AppError> {
        let (date, time) = parse_slot(&request.date, &request.time, today)?;

        let property = self
            .catalog
            .find_property(&request.property_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        self.notifier
            .tour_request(&user, &property, date, time, message)
            .await;

        tracing::info!(user_id, property_id = %property.id, %date, "Tour requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[test]
    fn test_valid_slot() {
        let (date, time) = parse_slot("2026-03-10", "14:30", today()).unwrap();
        assert_eq!(date, today());
        assert_eq!(time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn test_past_date() {
        assert!(matches!(
            parse_slot("2026-03-09", "09:00", today()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_malformed_fields_are_listed() {
        match parse_slot("10/03/2026", "9am", today()) {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["date", "time"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
