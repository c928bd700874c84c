//! Estate Store - document storage for the listings service
//!
//! Two implementations of the `UserStore` and `CatalogStore` traits:
//! - [`SurrealStore`]: SurrealDB over WebSocket (tables `users`, `regions`, `properties`)
//! - [`MemoryStore`]: in-process maps with the same conditional-write semantics

pub mod memory;
pub mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;
