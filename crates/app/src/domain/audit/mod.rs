//! Audit Log

pub mod records;
pub(crate) mod repository;
