//! Catalog service
//!
//! Regions and properties with their cross-entity rules: a property must
//! reference an existing region, images are uploaded before any record is
//! written, and stored images are released when the record that owns them
//! goes away.

use super::form::{FormData, PropertyDraft};
use crate::error::AppError;
use crate::notify::Notifier;
use chrono::Utc;
use estate_core::{
    normalize_city, CatalogStore, ImageStore, ImageUpload, Page, Property, PropertyFilter, Region,
    UserStore,
};
use std::sync::Arc;
use uuid::Uuid;

/// Result of deleting a region
#[derive(Debug, Clone)]
pub struct RegionRemoval {
    pub region: Region,
    pub orphaned_properties: u64,
}

pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
    users: Arc<dyn UserStore>,
    images: Arc<dyn ImageStore>,
    notifier: Arc<Notifier>,
}

fn property_not_found() -> AppError {
    AppError::NotFound("Property not found".to_string())
}

fn region_not_found() -> AppError {
    AppError::NotFound("Region not found".to_string())
}

impl CatalogService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        users: Arc<dyn UserStore>,
        images: Arc<dyn ImageStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            catalog,
            users,
            images,
            notifier,
        }
    }

    /// Upload in order; on failure release what was already stored
    async fn upload_all(&self, images: Vec<ImageUpload>) -> Result<Vec<String>, AppError> {
        let mut urls = Vec::with_capacity(images.len());

        for image in images {
            let file_name = image.file_name.clone();
            match self.images.upload(image).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    tracing::warn!(
                        file = %file_name,
                        uploaded = urls.len(),
                        error = %e,
                        "Image upload failed, releasing earlier uploads"
                    );
                    self.release(&urls).await;
                    return Err(AppError::Upstream(format!("Image upload failed: {e}")));
                }
            }
        }

        Ok(urls)
    }

    /// Best-effort removal of stored images
    async fn release(&self, urls: &[String]) {
        for url in urls {
            if let Err(e) = self.images.delete(url).await {
                tracing::warn!(url = %url, error = %e, "Failed to release stored image");
            }
        }
    }

    async fn ensure_region(&self, region_id: &str) -> Result<(), AppError> {
        match self.catalog.find_region(region_id).await? {
            Some(_) => Ok(()),
            None => Err(region_not_found()),
        }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub async fn list_properties(&self, filter: &PropertyFilter) -> Result<Page<Property>, AppError> {
        Ok(self.catalog.search_properties(filter).await?)
    }

    pub async fn get_property(&self, id: &str) -> Result<Property, AppError> {
        self.catalog
            .find_property(id)
            .await?
            .ok_or_else(property_not_found)
    }

    /// Validate, check the region, upload, insert, then announce the listing
    pub async fn create_property(&self, form: FormData) -> Result<Property, AppError> {
        let draft = PropertyDraft::from_fields(&form.fields)?;
        if form.images.is_empty() {
            return Err(AppError::BadRequest(
                "At least one image is required".to_string(),
            ));
        }
        self.ensure_region(&draft.region).await?;

        let urls = self.upload_all(form.images).await?;

        let now = Utc::now();
        let property = Property {
            id: Uuid::new_v4().simple().to_string(),
            name: draft.name,
            description: draft.description,
            location: draft.location,
            price: draft.price,
            sqft: draft.sqft,
            images: urls.clone(),
            region: draft.region,
            kind: draft.kind,
            created_at: now,
            updated_at: now,
        };

        let property = match self.catalog.insert_property(property).await {
            Ok(property) => property,
            Err(e) => {
                self.release(&urls).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            property_id = %property.id,
            region = %property.region,
            images = property.images.len(),
            "Property created"
        );

        match self.users.list_broadcast_recipients().await {
            Ok(recipients) => self.notifier.new_listing(&recipients, &property).await,
            Err(e) => tracing::warn!(error = %e, "Could not load listing broadcast recipients"),
        }

        Ok(property)
    }

    /// Merge submitted fields over the stored listing and append new images
    pub async fn update_property(&self, id: &str, form: FormData) -> Result<Property, AppError> {
        let existing = self.get_property(id).await?;

        let mut fields = PropertyDraft::fields_of(&existing);
        fields.extend(
            form.fields
                .into_iter()
                .filter(|(_, value)| !value.is_empty()),
        );
        let draft = PropertyDraft::from_fields(&fields)?;
        self.ensure_region(&draft.region).await?;

        let added = self.upload_all(form.images).await?;

        let mut images = existing.images;
        images.extend(added.iter().cloned());

        let property = Property {
            id: existing.id,
            name: draft.name,
            description: draft.description,
            location: draft.location,
            price: draft.price,
            sqft: draft.sqft,
            images,
            region: draft.region,
            kind: draft.kind,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        if let Err(e) = self.catalog.update_property(&property).await {
            self.release(&added).await;
            return Err(e.into());
        }

        tracing::info!(property_id = %property.id, added = added.len(), "Property updated");
        Ok(property)
    }

    /// Delete the record, then release its images best-effort
    pub async fn delete_property(&self, id: &str) -> Result<Property, AppError> {
        let property = self
            .catalog
            .delete_property(id)
            .await?
            .ok_or_else(property_not_found)?;

        self.release(&property.images).await;

        tracing::info!(property_id = %property.id, "Property deleted");
        Ok(property)
    }

    // ------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------

    pub async fn list_regions(&self) -> Result<Vec<Region>, AppError> {
        Ok(self.catalog.list_regions().await?)
    }

    pub async fn get_region(&self, id: &str) -> Result<Region, AppError> {
        self.catalog
            .find_region(id)
            .await?
            .ok_or_else(region_not_found)
    }

    pub async fn region_properties(
        &self,
        id: &str,
        mut filter: PropertyFilter,
    ) -> Result<Page<Property>, AppError> {
        self.get_region(id).await?;
        filter.region = Some(id.to_string());
        self.list_properties(&filter).await
    }

    async fn ensure_city_free(&self, city: &str, except: Option<&str>) -> Result<(), AppError> {
        let taken = self
            .catalog
            .list_regions()
            .await?
            .into_iter()
            .any(|r| r.city == city && Some(r.id.as_str()) != except);
        if taken {
            return Err(AppError::Conflict(format!("Region {city} already exists")));
        }
        Ok(())
    }

    fn single_image(images: Vec<ImageUpload>) -> Result<Option<ImageUpload>, AppError> {
        if images.len() > 1 {
            return Err(AppError::BadRequest(
                "A region takes a single image".to_string(),
            ));
        }
        Ok(images.into_iter().next())
    }

    pub async fn create_region(&self, form: FormData) -> Result<Region, AppError> {
        let city = form
            .text("city")
            .map(normalize_city)
            .ok_or_else(|| AppError::BadRequest("City is required".to_string()))?;
        let image = Self::single_image(form.images)?
            .ok_or_else(|| AppError::BadRequest("Region image is required".to_string()))?;

        self.ensure_city_free(&city, None).await?;
        let urls = self.upload_all(vec![image]).await?;

        let now = Utc::now();
        let region = Region {
            id: Uuid::new_v4().simple().to_string(),
            city,
            image: urls.first().cloned().unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        match self.catalog.insert_region(region).await {
            Ok(region) => {
                tracing::info!(region_id = %region.id, city = %region.city, "Region created");
                Ok(region)
            }
            Err(e) => {
                self.release(&urls).await;
                Err(e.into())
            }
        }
    }

    /// New city and/or new image; a replaced image is released afterwards
    pub async fn update_region(&self, id: &str, form: FormData) -> Result<Region, AppError> {
        let city = form.text("city").map(normalize_city);
        let image = Self::single_image(form.images)?;
        if city.is_none() && image.is_none() {
            return Err(AppError::BadRequest(
                "Provide a new city or a new image".to_string(),
            ));
        }

        let mut region = self.get_region(id).await?;
        if let Some(city) = &city {
            self.ensure_city_free(city, Some(id)).await?;
            region.city = city.clone();
        }

        let uploaded = match image {
            Some(image) => self.upload_all(vec![image]).await?,
            None => Vec::new(),
        };
        let replaced = match uploaded.first() {
            Some(url) => Some(std::mem::replace(&mut region.image, url.clone())),
            None => None,
        };
        region.updated_at = Utc::now();

        if let Err(e) = self.catalog.update_region(&region).await {
            self.release(&uploaded).await;
            return Err(e.into());
        }

        if let Some(old) = replaced {
            self.release(&[old]).await;
        }

        tracing::info!(region_id = %region.id, city = %region.city, "Region updated");
        Ok(region)
    }

    /// Unconditional delete; referencing properties are left in place
    pub async fn delete_region(&self, id: &str) -> Result<RegionRemoval, AppError> {
        let orphaned_properties = self.catalog.count_properties_in_region(id).await?;
        let region = self
            .catalog
            .delete_region(id)
            .await?
            .ok_or_else(region_not_found)?;

        self.release(&[region.image.clone()]).await;

        if orphaned_properties > 0 {
            tracing::warn!(
                region_id = %region.id,
                city = %region.city,
                orphaned_properties,
                "Region deleted while properties still reference it"
            );
        } else {
            tracing::info!(region_id = %region.id, "Region deleted");
        }

        Ok(RegionRemoval {
            region,
            orphaned_properties,
        })
    }
}
