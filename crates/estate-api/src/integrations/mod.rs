//! Adapters for the external email and image storage providers

pub mod brevo;
pub mod cloudinary;

pub use brevo::BrevoMailer;
pub use cloudinary::CloudinaryStore;
