//! API handlers

pub mod auth;
pub mod favorites;
pub mod health;
pub mod properties;
pub mod regions;
pub mod tours;
