//! Request and response bodies for the account endpoints

use super::password::validate_password_strength;
use super::tokens::TokenPair;
use estate_core::{ProfileUpdate, UserPublic};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn strong_password(password: &str) -> Result<(), ValidationError> {
    validate_password_strength(password).map_err(|problems| {
        let mut error = ValidationError::new("password_strength");
        error.message = Some(format!("Password {}", problems.join(", ")).into());
        error
    })
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom(function = "not_blank", message = "First name is required"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank", message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(custom(function = "strong_password"))]
    pub password: String,
    #[validate(custom(function = "not_blank", message = "Phone is required"))]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Optional body for refresh/logout when the cookie is unavailable
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(custom(function = "not_blank", message = "First name must not be blank"))]
    pub first_name: Option<String>,
    #[validate(custom(function = "not_blank", message = "Last name must not be blank"))]
    pub last_name: Option<String>,
    #[validate(custom(function = "not_blank", message = "Phone must not be blank"))]
    pub phone: Option<String>,
}

impl From<UpdateUserRequest> for ProfileUpdate {
    fn from(request: UpdateUserRequest) -> Self {
        Self {
            first_name: request.first_name.map(|v| v.trim().to_string()),
            last_name: request.last_name.map(|v| v.trim().to_string()),
            phone: request.phone.map(|v| v.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub old_password: String,
    #[validate(custom(function = "strong_password"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "strong_password"))]
    pub new_password: String,
}

/// User plus a fresh token pair
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: String,
    pub user: UserPublic,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    pub fn new(message: impl Into<String>, user: UserPublic, pair: &TokenPair) -> Self {
        Self {
            message: message.into(),
            user,
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub user: UserPublic,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            email: "ada@example.com".to_string(),
            password: "Str0ng!Pass".to_string(),
            phone: "08000000000".to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(register().validate().is_ok());
    }

    #[test]
    fn test_registration_field_errors() {
        let request = RegisterRequest {
            first_name: "  ".to_string(),
            email: "not-an-email".to_string(),
            password: "weak".to_string(),
            ..register()
        };

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("phone"));
    }

    #[test]
    fn test_camel_case_body() {
        let json = r#"{"firstName":"A","lastName":"B","email":"a@b.co","password":"x","phone":"1"}"#;
        let request: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.first_name, "A");
    }

    #[test]
    fn test_update_user_skips_absent_fields() {
        let request = UpdateUserRequest {
            phone: Some(" 0803 ".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_ok());

        let update = ProfileUpdate::from(request);
        assert_eq!(update.phone.as_deref(), Some("0803"));
        assert!(update.first_name.is_none());
    }
}
