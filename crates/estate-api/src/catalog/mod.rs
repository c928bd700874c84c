//! Property and region catalog

pub mod form;
pub mod service;

pub use form::{FormData, PropertyDraft, MAX_IMAGES, MAX_IMAGE_BYTES};
pub use service::{CatalogService, RegionRemoval};
