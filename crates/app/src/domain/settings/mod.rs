//! Settings
//!
//! Operator-tunable key/value settings: the USD exchange rate, the contact number
//! shown to shoppers, and the Instagram posts featured on the catalog page.

pub mod data;
pub mod errors;
mod repository;
pub mod service;

pub use errors::SettingsError;
pub use service::*;
