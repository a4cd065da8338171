//! # ACCloner Common Library
//!
//! Shared code for the ACCloner services including:
//! - Command catalog model (AC models, modes, temperature entries)
//! - Observer list primitives used by the session controller
//! - Event payload types
//! - Configuration resolution
//! - Common error types

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod observer;

pub use catalog::{AcCommand, AcModel, TemperatureEntry};
pub use error::{Error, Result};
pub use observer::{ObserverList, SubscriberId};
