//! Authentication and authorization
//!
//! - JWT signing and verification (access and refresh kinds)
//! - Token service with refresh-token persistence and rotation
//! - Password hashing with Argon2id
//! - Bearer-token and admin-role middleware
//! - Session cookies
//! - Account service (register, verify, login, password flows)

pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod tokens;

pub use cookies::CookiePolicy;
pub use jwt::{Claims, JwtConfig, JwtError, TokenKind};
pub use middleware::{require_admin, require_auth, AuthError, AuthenticatedUser};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordConfig};
pub use service::AuthService;
pub use tokens::{hash_token, TokenPair, TokenService};
