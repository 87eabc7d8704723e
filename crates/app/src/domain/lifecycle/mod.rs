//! Lifecycle
//!
//! Every operator-driven product transition goes through the controller: it checks the
//! current state, persists through the catalog, and queues generation work.

pub mod controller;
pub mod data;
pub mod decision;
pub mod errors;

pub use controller::*;
pub use decision::{Decision, Rejection};
pub use errors::LifecycleError;
