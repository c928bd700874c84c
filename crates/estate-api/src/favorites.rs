//! Favorites
//!
//! The user/property edge lives on the user document. Duplicate and missing
//! edges are decided by the store in a single conditional write.

use crate::error::AppError;
use estate_core::{CatalogStore, Property, UserStore};
use std::sync::Arc;

pub struct FavoritesService {
    users: Arc<dyn UserStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl FavoritesService {
    pub fn new(users: Arc<dyn UserStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { users, catalog }
    }

    pub async fn add(&self, user_id: &str, property_id: &str) -> Result<Property, AppError> {
        let property = self
            .catalog
            .find_property(property_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

        if !self.users.add_favorite(user_id, property_id).await? {
            return Err(AppError::Conflict(
                "Property is already a favorite".to_string(),
            ));
        }

        tracing::debug!(user_id, property_id, "Favorite added");
        Ok(property)
    }

    /// The property itself need not exist any more
    pub async fn remove(&self, user_id: &str, property_id: &str) -> Result<(), AppError> {
        if !self.users.remove_favorite(user_id, property_id).await? {
            return Err(AppError::NotFound(
                "Property is not in favorites".to_string(),
            ));
        }

        tracing::debug!(user_id, property_id, "Favorite removed");
        Ok(())
    }

    /// Favorites resolved against the live catalog; deleted listings drop out
    pub async fn list(&self, user_id: &str) -> Result<Vec<Property>, AppError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(self.catalog.find_properties(&user.favorites).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use estate_core::{Property, PropertyKind, User};
    use estate_store::MemoryStore;

    fn land(id: &str) -> Property {
        let now = Utc::now();
        Property {
            id: id.to_string(),
            name: "Plot".to_string(),
            description: "Dry land".to_string(),
            location: "Epe".to_string(),
            price: 10.0,
            sqft: 100.0,
            images: vec!["https://img/1.jpg".to_string()],
            region: "r1".to_string(),
            kind: PropertyKind::Land,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (FavoritesService, MemoryStore) {
        let store = MemoryStore::new();
        store
            .insert_user(User::new(
                "u1".into(),
                "Ada".into(),
                "Obi".into(),
                "ada@example.com",
                "0800".into(),
                "hash".into(),
            ))
            .await
            .unwrap();
        store.insert_property(land("p1")).await.unwrap();

        let service = FavoritesService::new(Arc::new(store.clone()), Arc::new(store.clone()));
        (service, store)
    }

    #[tokio::test]
    async fn test_add_twice_conflicts() {
        let (service, _) = setup().await;
        service.add("u1", "p1").await.unwrap();

        let err = service.add("u1", "p1").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(service.list("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_missing_property() {
        let (service, _) = setup().await;
        let err = service.add("u1", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_missing_edge() {
        let (service, _) = setup().await;
        let err = service.remove("u1", "p1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_skips_deleted_properties() {
        let (service, store) = setup().await;
        service.add("u1", "p1").await.unwrap();
        store.delete_property("p1").await.unwrap();

        assert!(service.list("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_unknown_user() {
        let (service, _) = setup().await;
        assert!(matches!(
            service.list("ghost").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
