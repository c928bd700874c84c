//! Multipart listing forms
//!
//! Text parts become a field map; file parts become [`ImageUpload`]s. A
//! [`PropertyDraft`] is the validated shape of a listing before its images
//! are uploaded.

use crate::error::{AppError, FieldError};
use axum::extract::Multipart;
use estate_core::{HouseDetails, ImageUpload, Property, PropertyKind, PropertyType};
use std::collections::HashMap;

pub const MAX_IMAGES: usize = 5;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Parsed multipart body
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub images: Vec<ImageUpload>,
}

impl FormData {
    /// Drain a multipart body, enforcing image type, size and count
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field.text().await?;
                form.fields.insert(name, value.trim().to_string());
                continue;
            };

            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_default();

            let mut bytes = Vec::new();
            while let Some(chunk) = field.chunk().await? {
                bytes.extend_from_slice(&chunk);
                if bytes.len() > MAX_IMAGE_BYTES {
                    return Err(AppError::BadRequest(format!(
                        "Image {file_name} exceeds the 5 MiB limit"
                    )));
                }
            }

            // Browsers send an empty part for an untouched file input
            if bytes.is_empty() && file_name.is_empty() {
                continue;
            }

            if !content_type.starts_with("image/") {
                return Err(AppError::BadRequest(format!(
                    "File {file_name} is not an image"
                )));
            }

            form.images.push(ImageUpload {
                file_name,
                content_type,
                bytes,
            });
            if form.images.len() > MAX_IMAGES {
                return Err(AppError::BadRequest(format!(
                    "At most {MAX_IMAGES} images may be uploaded"
                )));
            }
        }

        Ok(form)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

const BASE_FIELDS: [&str; 7] = [
    "name",
    "description",
    "location",
    "propertyType",
    "price",
    "sqft",
    "region",
];

const HOUSE_FIELDS: [&str; 5] = ["beds", "baths", "furnished", "propertyDetails", "features"];

/// Validated listing fields, images not yet attached
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    pub price: f64,
    pub sqft: f64,
    pub region: String,
    pub kind: PropertyKind,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_positive(field: &str, value: &str, errors: &mut Vec<FieldError>) -> f64 {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => n,
        _ => {
            errors.push(FieldError::new(field, format!("{field} must be a number greater than 0")));
            0.0
        }
    }
}

fn parse_count(field: &str, value: &str, errors: &mut Vec<FieldError>) -> u32 {
    value.parse::<u32>().unwrap_or_else(|_| {
        errors.push(FieldError::new(field, format!("{field} must be a whole number of 0 or more")));
        0
    })
}

impl PropertyDraft {
    /// Validate a field map. House attributes are required only for houses;
    /// every missing field is reported at once.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, AppError> {
        let get = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let property_type = match get("propertyType") {
            Some(raw) => Some(raw.parse::<PropertyType>().map_err(|_| {
                AppError::Validation(vec![FieldError::new(
                    "propertyType",
                    "propertyType must be House or Land",
                )])
            })?),
            None => None,
        };

        let mut required: Vec<&str> = BASE_FIELDS.to_vec();
        if property_type == Some(PropertyType::House) {
            required.extend(HOUSE_FIELDS);
        }

        let mut errors: Vec<FieldError> = required
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| FieldError::new(*key, format!("{key} is required")))
            .collect();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let text = |key: &str| get(key).unwrap_or_default().to_string();
        let price = parse_positive("price", &text("price"), &mut errors);
        let sqft = parse_positive("sqft", &text("sqft"), &mut errors);

        let kind = match property_type {
            Some(PropertyType::House) => {
                let beds = parse_count("beds", &text("beds"), &mut errors);
                let baths = parse_count("baths", &text("baths"), &mut errors);
                let furnished = parse_bool(&text("furnished")).unwrap_or_else(|| {
                    errors.push(FieldError::new("furnished", "furnished must be true or false"));
                    false
                });
                PropertyKind::House(HouseDetails {
                    beds,
                    baths,
                    furnished,
                    property_details: text("propertyDetails"),
                    features: text("features"),
                })
            }
            _ => PropertyKind::Land,
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(Self {
            name: text("name"),
            description: text("description"),
            location: text("location"),
            price,
            sqft,
            region: text("region"),
            kind,
        })
    }

    /// Field map of an existing listing, used as the base for updates
    pub fn fields_of(property: &Property) -> HashMap<String, String> {
        let mut fields = HashMap::from([
            ("name".to_string(), property.name.clone()),
            ("description".to_string(), property.description.clone()),
            ("location".to_string(), property.location.clone()),
            (
                "propertyType".to_string(),
                property.property_type().to_string(),
            ),
            ("price".to_string(), property.price.to_string()),
            ("sqft".to_string(), property.sqft.to_string()),
            ("region".to_string(), property.region.clone()),
        ]);

        if let PropertyKind::House(house) = &property.kind {
            fields.insert("beds".to_string(), house.beds.to_string());
            fields.insert("baths".to_string(), house.baths.to_string());
            fields.insert("furnished".to_string(), house.furnished.to_string());
            fields.insert("propertyDetails".to_string(), house.property_details.clone());
            fields.insert("features".to_string(), house.features.clone());
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn land() -> HashMap<String, String> {
        fields(&[
            ("name", "Plot 7"),
            ("description", "Dry, fenced"),
            ("location", "Epe"),
            ("propertyType", "Land"),
            ("price", "1500000"),
            ("sqft", "600"),
            ("region", "r1"),
        ])
    }

    fn field_names(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_land_without_house_fields() {
        let draft = PropertyDraft::from_fields(&land()).unwrap();
        assert_eq!(draft.kind, PropertyKind::Land);
        assert_eq!(draft.price, 1_500_000.0);
    }

    #[test]
    fn test_house_requires_house_fields() {
        let mut form = land();
        form.insert("propertyType".to_string(), "House".to_string());
        form.insert("baths".to_string(), "2".to_string());

        let missing = field_names(PropertyDraft::from_fields(&form).unwrap_err());
        assert_eq!(missing, vec!["beds", "furnished", "propertyDetails", "features"]);
    }

    #[test]
    fn test_complete_house() {
        let mut form = land();
        form.extend(fields(&[
            ("propertyType", "House"),
            ("beds", "3"),
            ("baths", "2"),
            ("furnished", "yes"),
            ("propertyDetails", "Duplex"),
            ("features", "pool,gym"),
        ]));

        let draft = PropertyDraft::from_fields(&form).unwrap();
        match draft.kind {
            PropertyKind::House(house) => {
                assert_eq!(house.beds, 3);
                assert!(house.furnished);
            }
            PropertyKind::Land => panic!("expected a house"),
        }
    }

    #[test]
    fn test_missing_base_fields_are_all_reported() {
        let missing = field_names(PropertyDraft::from_fields(&HashMap::new()).unwrap_err());
        assert_eq!(missing.len(), BASE_FIELDS.len());
    }

    #[test]
    fn test_bad_numbers() {
        let mut form = land();
        form.insert("price".to_string(), "-5".to_string());
        form.insert("sqft".to_string(), "big".to_string());

        let bad = field_names(PropertyDraft::from_fields(&form).unwrap_err());
        assert_eq!(bad, vec!["price", "sqft"]);
    }

    #[test]
    fn test_unknown_property_type() {
        let mut form = land();
        form.insert("propertyType".to_string(), "Castle".to_string());
        assert_eq!(
            field_names(PropertyDraft::from_fields(&form).unwrap_err()),
            vec!["propertyType"]
        );
    }
}
