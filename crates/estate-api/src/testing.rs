//! Test utilities for the router-level tests
//!
//! In-memory stores, a mailer that records every message and an image store
//! that counts uploads and deletions.

use crate::auth::{hash_password, PasswordConfig};
use crate::state::{AppState, Backends};
use crate::create_router;
use async_trait::async_trait;
use axum::Router;
use estate_core::{
    AppConfig, EmailMessage, EstateError, ImageStore, ImageUpload, Mailer, Result, Role, User,
    UserStore,
};
use estate_store::MemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Mailer that keeps every message in memory
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, email: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.to_email == email)
            .collect()
    }

    /// Token following `marker` (e.g. `/verify-email/`) in the latest
    /// message to `email` that contains it
    pub fn token_after(&self, email: &str, marker: &str) -> Option<String> {
        self.sent_to(email).iter().rev().find_map(|m| {
            let (_, rest) = m.html.split_once(marker)?;
            let token: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect();
            (!token.is_empty()).then_some(token)
        })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}

/// Image store that hands out fake URLs and counts calls
#[derive(Default)]
pub struct CountingImageStore {
    uploads: AtomicUsize,
    deleted: Mutex<Vec<String>>,
    /// Fail every upload after this many have succeeded
    fail_after: Option<usize>,
}

impl CountingImageStore {
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageStore for CountingImageStore {
    async fn upload(&self, image: ImageUpload) -> Result<String> {
        let done = self.uploads.load(Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| done >= limit) {
            return Err(EstateError::Upstream(format!(
                "upload of {} refused",
                image.file_name
            )));
        }

        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://res.cloudinary.com/test/image/upload/v1/estate/img{n}.jpg"
        ))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(url.to_string());
        }
        Ok(())
    }
}

/// Router plus handles on everything behind it
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub mailer: Arc<RecordingMailer>,
    pub images: Arc<CountingImageStore>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = "test-secret-key-for-router-tests".to_string();
    config.mail.admin_email = "office@estate.test".to_string();
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_images(CountingImageStore::default())
    }

    pub fn with_images(images: CountingImageStore) -> Self {
        let store = MemoryStore::new();
        let mailer = Arc::new(RecordingMailer::default());
        let images = Arc::new(images);

        let backends = Backends {
            users: Arc::new(store.clone()),
            catalog: Arc::new(store.clone()),
            images: images.clone(),
            mailer: mailer.clone(),
        };
        let state = Arc::new(AppState::with_password_config(
            test_config(),
            backends,
            PasswordConfig::fast(),
        ));

        Self {
            router: create_router(state.clone()),
            state,
            store,
            mailer,
            images,
        }
    }

    /// Insert an account directly, bypassing registration
    pub async fn seed_user(&self, email: &str, password: &str, role: Role, verified: bool) -> User {
        let hash = hash_password(password, &PasswordConfig::fast()).expect("hash password");
        let mut user = User::new(
            Uuid::new_v4().simple().to_string(),
            "Test".to_string(),
            "User".to_string(),
            email,
            "08000000000".to_string(),
            hash,
        );
        user.role = role;
        user.email_verified = verified;

        self.store.insert_user(user).await.expect("seed user")
    }

    /// Bearer access token for an existing user
    pub fn access_token(&self, user: &User) -> String {
        self.state
            .tokens
            .issue(&user.id, user.role)
            .expect("issue tokens")
            .access_token
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a router with in-memory backends for testing
pub fn create_router_for_testing() -> Router {
    TestApp::new().router
}
