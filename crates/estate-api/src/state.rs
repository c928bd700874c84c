//! Application state management
//!
//! Everything a handler needs is built once here from [`AppConfig`] and the
//! storage/provider backends; nothing reads the environment afterwards.

use crate::auth::{AuthService, CookiePolicy, JwtConfig, PasswordConfig, TokenService};
use crate::catalog::CatalogService;
use crate::favorites::FavoritesService;
use crate::notify::Notifier;
use crate::tours::TourService;
use estate_core::{AppConfig, CatalogStore, ImageStore, Mailer, UserStore};
use std::sync::Arc;
use std::time::Instant;

/// Storage and provider implementations chosen at startup
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub images: Arc<dyn ImageStore>,
    pub mailer: Arc<dyn Mailer>,
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
    pub auth: AuthService,
    pub catalog: CatalogService,
    pub favorites: FavoritesService,
    pub tours: TourService,
    /// Attributes of the session cookies
    pub cookies: CookiePolicy,
}

impl AppState {
    pub fn new(config: AppConfig, backends: Backends) -> Self {
        Self::with_password_config(config, backends, PasswordConfig::default())
    }

    pub fn with_password_config(
        config: AppConfig,
        backends: Backends,
        password_config: PasswordConfig,
    ) -> Self {
        let Backends {
            users,
            catalog,
            images,
            mailer,
        } = backends;

        let jwt = JwtConfig::from(config.jwt.clone());
        let cookies = CookiePolicy {
            secure: config.server.environment.is_production(),
            access_max_age: jwt.access_ttl,
            refresh_max_age: jwt.refresh_ttl,
        };

        let notifier = Arc::new(Notifier::new(mailer, &config.server.client_url, &config.mail));
        let tokens = Arc::new(TokenService::new(jwt, users.clone()));

        Self {
            auth: AuthService::new(
                users.clone(),
                tokens.clone(),
                notifier.clone(),
                password_config,
            ),
            catalog: CatalogService::new(
                catalog.clone(),
                users.clone(),
                images,
                notifier.clone(),
            ),
            favorites: FavoritesService::new(users.clone(), catalog.clone()),
            tours: TourService::new(users.clone(), catalog, notifier),
            tokens,
            users,
            cookies,
            config,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
