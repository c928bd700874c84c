//! In-memory store
//!
//! Every conditional write runs under a single write lock, which gives the
//! same check-and-set behaviour the SurrealDB queries provide.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use estate_core::{
    CatalogStore, EstateError, Page, ProfileUpdate, Property, PropertyFilter, Recipient,
    RefreshTokenEntry, Region, Result, Role, User, UserStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    regions: HashMap<String, Region>,
    properties: HashMap<String, Property>,
}

/// Users, regions and properties held in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn user_not_found(id: &str) -> EstateError {
    EstateError::NotFound(format!("user {id}"))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(EstateError::Conflict("email already registered".to_string()));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(id).map(|user| {
            update.apply(user);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_password(&self, id: &str, password_hash: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn redeem_verification_token(&self, token: &str) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .values_mut()
            .find(|u| u.verification_token.as_deref() == Some(token));

        Ok(user.map(|user| {
            user.email_verified = true;
            user.verification_token = None;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_reset_token(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        user.reset_password_token = Some(token_hash.to_string());
        user.reset_password_expires = Some(expires_at);
        Ok(())
    }

    async fn find_user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.reset_password_token.as_deref() == Some(token_hash)
                    && u.reset_password_expires.is_some_and(|exp| exp > now)
            })
            .cloned())
    }

    async fn redeem_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        let user = tables.users.values_mut().find(|u| {
            u.reset_password_token.as_deref() == Some(token_hash)
                && u.reset_password_expires.is_some_and(|exp| exp > now)
        });

        Ok(user.map(|user| {
            user.password_hash = password_hash.to_string();
            user.reset_password_token = None;
            user.reset_password_expires = None;
            user.refresh_tokens.clear();
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn push_refresh_token(
        &self,
        id: &str,
        entry: RefreshTokenEntry,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or_else(|| user_not_found(id))?;
        user.refresh_tokens.retain(|t| !t.is_expired(now));
        user.refresh_tokens.push(entry);
        Ok(())
    }

    async fn take_refresh_token(&self, id: &str, token_hash: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(id) else {
            return Ok(false);
        };
        let before = user.refresh_tokens.len();
        user.refresh_tokens.retain(|t| t.token_hash != token_hash);
        Ok(user.refresh_tokens.len() < before)
    }

    async fn clear_refresh_tokens(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(id) {
            user.refresh_tokens.clear();
        }
        Ok(())
    }

    async fn add_favorite(&self, user_id: &str, property_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        if user.favorites.iter().any(|f| f == property_id) {
            return Ok(false);
        }
        user.favorites.push(property_id.to_string());
        Ok(true)
    }

    async fn remove_favorite(&self, user_id: &str, property_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        let before = user.favorites.len();
        user.favorites.retain(|f| f != property_id);
        Ok(user.favorites.len() < before)
    }

    async fn list_broadcast_recipients(&self) -> Result<Vec<Recipient>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.email_verified && u.role != Role::Admin)
            .map(|u| Recipient {
                email: u.email.clone(),
                name: u.full_name(),
            })
            .collect())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_region(&self, region: Region) -> Result<Region> {
        let mut tables = self.tables.write().await;
        if tables.regions.values().any(|r| r.city == region.city) {
            return Err(EstateError::Conflict(format!(
                "region {} already exists",
                region.city
            )));
        }
        tables.regions.insert(region.id.clone(), region.clone());
        Ok(region)
    }

    async fn find_region(&self, id: &str) -> Result<Option<Region>> {
        Ok(self.tables.read().await.regions.get(id).cloned())
    }

    async fn list_regions(&self) -> Result<Vec<Region>> {
        let tables = self.tables.read().await;
        let mut regions: Vec<Region> = tables.regions.values().cloned().collect();
        regions.sort_by(|a, b| a.city.cmp(&b.city));
        Ok(regions)
    }

    async fn update_region(&self, region: &Region) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .regions
            .values()
            .any(|r| r.id != region.id && r.city == region.city)
        {
            return Err(EstateError::Conflict(format!(
                "region {} already exists",
                region.city
            )));
        }
        let slot = tables
            .regions
            .get_mut(&region.id)
            .ok_or_else(|| EstateError::NotFound(format!("region {}", region.id)))?;
        *slot = region.clone();
        Ok(())
    }

    async fn delete_region(&self, id: &str) -> Result<Option<Region>> {
        Ok(self.tables.write().await.regions.remove(id))
    }

    async fn insert_property(&self, property: Property) -> Result<Property> {
        let mut tables = self.tables.write().await;
        tables
            .properties
            .insert(property.id.clone(), property.clone());
        Ok(property)
    }

    async fn find_property(&self, id: &str) -> Result<Option<Property>> {
        Ok(self.tables.read().await.properties.get(id).cloned())
    }

    async fn find_properties(&self, ids: &[String]) -> Result<Vec<Property>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.properties.get(id).cloned())
            .collect())
    }

    async fn search_properties(&self, filter: &PropertyFilter) -> Result<Page<Property>> {
        let tables = self.tables.read().await;
        let mut matched: Vec<&Property> = tables
            .properties
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(filter.offset())
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn update_property(&self, property: &Property) -> Result<()> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .properties
            .get_mut(&property.id)
            .ok_or_else(|| EstateError::NotFound(format!("property {}", property.id)))?;
        *slot = property.clone();
        Ok(())
    }

    async fn delete_property(&self, id: &str) -> Result<Option<Property>> {
        Ok(self.tables.write().await.properties.remove(id))
    }

    async fn count_properties_in_region(&self, region_id: &str) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .properties
            .values()
            .filter(|p| p.region == region_id)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use estate_core::PropertyKind;

    fn user(id: &str, email: &str) -> User {
        User::new(
            id.to_string(),
            "Test".to_string(),
            "User".to_string(),
            email,
            "0800".to_string(),
            "hash".to_string(),
        )
    }

    fn property(id: &str, region: &str, price: f64, age_secs: i64) -> Property {
        let created = Utc::now() - Duration::seconds(age_secs);
        Property {
            id: id.to_string(),
            name: format!("Listing {id}"),
            description: "desc".to_string(),
            location: "loc".to_string(),
            price,
            sqft: 100.0,
            images: vec![format!("https://img/{id}.jpg")],
            region: region.to_string(),
            kind: PropertyKind::Land,
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.insert_user(user("u1", "a@test.com")).await.unwrap();
        let err = store.insert_user(user("u2", "A@Test.com")).await.unwrap_err();
        assert!(matches!(err, EstateError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let store = MemoryStore::new();
        let mut u = user("u1", "a@test.com");
        u.verification_token = Some("tok".to_string());
        store.insert_user(u).await.unwrap();

        let verified = store.redeem_verification_token("tok").await.unwrap();
        assert!(verified.is_some_and(|u| u.email_verified));
        assert!(store.redeem_verification_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_favorite_adds_store_one_edge() {
        let store = MemoryStore::new();
        store.insert_user(user("u1", "a@test.com")).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.add_favorite("u1", "p1").await.unwrap() })
            })
            .collect();

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() {
                added += 1;
            }
        }

        assert_eq!(added, 1);
        let u = store.find_user("u1").await.unwrap().unwrap();
        assert_eq!(u.favorites, vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn test_favorite_on_missing_user() {
        let store = MemoryStore::new();
        let err = store.add_favorite("ghost", "p1").await.unwrap_err();
        assert!(matches!(err, EstateError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_take_and_prune() {
        let store = MemoryStore::new();
        store.insert_user(user("u1", "a@test.com")).await.unwrap();
        let now = Utc::now();

        let stale = RefreshTokenEntry {
            token_hash: "old".to_string(),
            expires_at: now - Duration::hours(1),
        };
        let live = RefreshTokenEntry {
            token_hash: "new".to_string(),
            expires_at: now + Duration::days(7),
        };
        store
            .push_refresh_token("u1", stale, now - Duration::days(1))
            .await
            .unwrap();
        store.push_refresh_token("u1", live, now).await.unwrap();

        let u = store.find_user("u1").await.unwrap().unwrap();
        assert_eq!(u.refresh_tokens.len(), 1);

        assert!(store.take_refresh_token("u1", "new").await.unwrap());
        assert!(!store.take_refresh_token("u1", "new").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_token_expiry() {
        let store = MemoryStore::new();
        store.insert_user(user("u1", "a@test.com")).await.unwrap();
        let now = Utc::now();
        store
            .set_reset_token("u1", "digest", now + Duration::hours(1))
            .await
            .unwrap();

        assert!(store
            .find_user_by_reset_token("digest", now)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_user_by_reset_token("other", now)
            .await
            .unwrap()
            .is_none());

        let late = now + Duration::hours(2);
        assert!(store
            .find_user_by_reset_token("digest", late)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .redeem_reset_token("digest", "new", late)
            .await
            .unwrap()
            .is_none());

        let u = store
            .redeem_reset_token("digest", "new", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(u.password_hash, "new");
        assert!(u.reset_password_token.is_none());
    }

    #[tokio::test]
    async fn test_search_filters_and_paginates_newest_first() {
        let store = MemoryStore::new();
        for (i, price) in [100.0, 200.0, 300.0, 400.0].into_iter().enumerate() {
            store
                .insert_property(property(&format!("p{i}"), "r1", price, i as i64 * 10))
                .await
                .unwrap();
        }
        store
            .insert_property(property("other", "r2", 250.0, 0))
            .await
            .unwrap();

        let page = store
            .search_properties(&PropertyFilter {
                region: Some("r1".to_string()),
                min_price: Some(150.0),
                page: 1,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_region_city_unique_on_update() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let region = |id: &str, city: &str| Region {
            id: id.to_string(),
            city: city.to_string(),
            image: "https://img/r.jpg".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.insert_region(region("r1", "LAGOS")).await.unwrap();
        store.insert_region(region("r2", "ABUJA")).await.unwrap();

        let err = store.update_region(&region("r2", "LAGOS")).await.unwrap_err();
        assert!(matches!(err, EstateError::Conflict(_)));
        store.update_region(&region("r2", "KANO")).await.unwrap();
    }
}
