//! Catalog
//!
//! Products, their images and variant options, persisted with one audit row per
//! mutation.

pub mod data;
pub mod errors;
pub mod records;
mod repository;
pub mod service;

pub use errors::CatalogError;
pub use service::*;
