//! # ACCloner Learning Session Library (accloner-ls)
//!
//! Core learning-session controller for capturing infrared remote-control
//! signals from a hardware transmitter.
//!
//! **Purpose:** Accept a single TCP transmitter connection, merge each
//! received signal frame into the operator-selected model/mode/temperature
//! slot of the command catalog, persist the catalog, and fan events out to
//! registered observers.
//!
//! **Architecture:** One accept loop feeding a single transmitter slot,
//! shared selection state guarded by async locks, and a SQLite-backed
//! catalog store.

pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use session::SessionController;
