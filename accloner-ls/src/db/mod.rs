//! Database access layer
//!
//! Catalog schema bootstrap and the model store used by the session
//! controller.

pub mod init;
pub mod store;

pub use store::CatalogStore;
