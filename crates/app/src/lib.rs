//! Boutique catalog services: persistence, lifecycle, generation jobs and operator
//! messaging.

pub mod config;
pub mod context;
pub mod database;
pub mod dispatch;
pub mod domain;
pub mod generator;
pub mod jobs;
pub mod messaging;
pub mod observability;
pub mod shutdown;
pub mod storage;

#[cfg(test)]
mod test;

mod uuids;
