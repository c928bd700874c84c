//! Account API handlers
//!
//! Registration, login and refresh return the token pair in the body and
//! mirror it into HTTP-only cookies.

use crate::audit::RequestMeta;
use crate::auth::cookies::{clear_session, refresh_token, set_session};
use crate::auth::models::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
    RefreshRequest, RegisterRequest, ResetPasswordRequest, TokenResponse, UpdateUserRequest,
    UserResponse,
};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Register a new account
///
/// The account starts unverified; a verification link is emailed.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid input or email already registered", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, pair) = state.auth.register(request, meta).await?;

    let jar = set_session(jar, &pair, &state.cookies);
    let body = AuthResponse::new(
        "Registration successful. Check your email to verify your account",
        user.to_public(),
        &pair,
    );

    Ok((StatusCode::CREATED, jar, Json(body)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 401, description = "Email not verified", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, pair) = state.auth.login(request, meta).await?;

    let jar = set_session(jar, &pair, &state.cookies);
    Ok((jar, Json(AuthResponse::new("Login successful", user.to_public(), &pair))))
}

#[utoipa::path(
    get,
    path = "/auth/verify-email/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "Verification token from the email")),
    responses(
        (status = 200, description = "Email verified", body = UserResponse),
        (status = 400, description = "Invalid or already used token", body = crate::error::ApiError),
    )
)]
pub async fn verify_email_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.auth.verify_email(&token).await?;
    Ok(Json(UserResponse {
        user: user.to_public(),
    }))
}

/// Exchange a refresh token for a new pair
///
/// The cookie is preferred; the body is read when no cookie is present.
/// The presented token is spent.
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    tag = "auth",
    request_body(content = RefreshRequest, description = "Only needed without the refresh cookie"),
    responses(
        (status = 200, description = "New tokens issued", body = TokenResponse),
        (status = 400, description = "Missing, invalid or spent refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let body_token = body.and_then(|Json(b)| b.refresh_token);
    let token = refresh_token(&jar, body_token.as_deref());

    let (_, pair) = state.auth.refresh(token, meta).await?;

    let jar = set_session(jar, &pair, &state.cookies);
    Ok((
        jar,
        Json(TokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

/// End the session
///
/// Cookies are always cleared. Only a missing refresh token is an error.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 400, description = "No refresh token presented", body = crate::error::ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Response {
    let body_token = body.and_then(|Json(b)| b.refresh_token);
    let token = refresh_token(&jar, body_token.as_deref());
    let jar = clear_session(jar, &state.cookies);

    match token {
        Some(token) => {
            state.auth.logout(&token, meta).await;
            (jar, Json(MessageResponse::new("Logged out"))).into_response()
        }
        None => (
            jar,
            AppError::BadRequest("Refresh token required".to_string()),
        )
            .into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.auth.profile(&current.user_id).await?;
    Ok(Json(UserResponse {
        user: user.to_public(),
    }))
}

#[utoipa::path(
    put,
    path = "/auth/updateuser",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Nothing to update", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .auth
        .update_user(&current.user_id, request.into())
        .await?;
    Ok(Json(UserResponse {
        user: user.to_public(),
    }))
}

/// Change the password; every session of the user ends
#[utoipa::path(
    put,
    path = "/auth/change-password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password is incorrect", body = crate::error::ApiError),
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<AuthenticatedUser>,
    meta: RequestMeta,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .change_password(&current.user_id, request, meta)
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = MessageResponse),
        (status = 404, description = "No account with that email", body = crate::error::ApiError),
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(request): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = request.email.trim().to_lowercase();
    state.auth.forgot_password(&email, meta).await?;
    Ok(Json(MessageResponse::new(
        "Password reset link sent to your email",
    )))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password/{resetToken}",
    tag = "auth",
    params(("resetToken" = String, Path, description = "Token from the reset email")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = crate::error::ApiError),
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Path(reset_token): Path<String>,
    meta: RequestMeta,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .reset_password(&reset_token, &request.new_password, meta)
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
