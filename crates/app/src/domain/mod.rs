//! Boutique Domain Concerns

pub mod audit;
pub mod catalog;
pub mod lifecycle;
pub mod settings;
