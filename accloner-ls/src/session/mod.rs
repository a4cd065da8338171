//! Learning session components
//!
//! The session controller, its observer registry, and the shared
//! model/mode/temperature selection state.

pub mod controller;
pub mod observers;
pub mod selection;

pub use controller::SessionController;
pub use observers::SessionObservers;
