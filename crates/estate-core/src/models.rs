//! Domain models for accounts and the listing catalog
//!
//! `User` is the persisted credential record and is never serialized into
//! API responses; handlers expose [`UserPublic`] instead. Properties are a
//! tagged union over [`PropertyKind`] so House-only attributes exist only
//! on houses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Accounts
// ============================================================================

/// Account role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A persisted refresh token. Only the SHA-256 digest is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenEntry {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// User account record as held by the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Lower-cased, unique
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub role: Role,
    /// Argon2id PHC string
    pub password_hash: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub verification_token: Option<String>,
    /// SHA-256 of the outstanding reset token
    #[serde(default)]
    pub reset_password_token: Option<String>,
    #[serde(default)]
    pub reset_password_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshTokenEntry>,
    /// Property ids, unique membership
    #[serde(default)]
    pub favorites: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an unverified account with the default role.
    pub fn new(
        id: String,
        first_name: String,
        last_name: String,
        email: &str,
        phone: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            first_name,
            last_name,
            email: email.trim().to_lowercase(),
            phone,
            role: Role::User,
            password_hash,
            email_verified: false,
            verification_token: None,
            reset_password_token: None,
            reset_password_expires: None,
            refresh_tokens: Vec::new(),
            favorites: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Convert to the representation returned by the API (no secrets)
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role,
            email_verified: self.email_verified,
            favorites: self.favorites.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub email_verified: bool,
    pub favorites: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = phone.clone();
        }
    }
}

/// Email recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

// ============================================================================
// Catalog
// ============================================================================

/// Trim, collapse inner whitespace and upper-case a city name.
pub fn normalize_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Region a property belongs to
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    /// Unique, upper-cased
    pub city: String,
    /// URL of the stored image
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Property discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PropertyType {
    House,
    Land,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "House",
            PropertyType::Land => "Land",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "house" => Ok(PropertyType::House),
            "land" => Ok(PropertyType::Land),
            other => Err(format!("unknown property type: {other}")),
        }
    }
}

/// Attributes that only exist on houses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HouseDetails {
    pub beds: u32,
    pub baths: u32,
    pub furnished: bool,
    pub property_details: String,
    /// Comma-separated feature list
    pub features: String,
}

impl HouseDetails {
    pub fn feature_list(&self) -> Vec<&str> {
        self.features
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "propertyType")]
pub enum PropertyKind {
    House(HouseDetails),
    Land,
}

impl PropertyKind {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyKind::House(_) => PropertyType::House,
            PropertyKind::Land => PropertyType::Land,
        }
    }
}

/// Catalog listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub price: f64,
    pub sqft: f64,
    /// Ordered image URLs, at least one
    pub images: Vec<String>,
    /// Region id
    pub region: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn property_type(&self) -> PropertyType {
        self.kind.property_type()
    }
}

/// Listing filter and pagination
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub region: Option<String>,
    pub property_type: Option<PropertyType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl Default for PropertyFilter {
    fn default() -> Self {
        Self {
            region: None,
            property_type: None,
            min_price: None,
            max_price: None,
            page: 1,
            limit: 20,
        }
    }
}

impl PropertyFilter {
    pub const MAX_LIMIT: u32 = 100;

    pub fn matches(&self, property: &Property) -> bool {
        self.region.as_ref().map_or(true, |r| &property.region == r)
            && self
                .property_type
                .map_or(true, |t| property.property_type() == t)
            && self.min_price.map_or(true, |min| property.price >= min)
            && self.max_price.map_or(true, |max| property.price <= max)
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

// ============================================================================
// Collaborator payloads
// ============================================================================

/// An image received from a client, ready for upload
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Outbound email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
}
