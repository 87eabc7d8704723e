//! Boutique
//!
//! Domain core for an operator-driven boutique catalog: product lifecycle rules, image
//! versioning, caption metadata parsing and price display. Contains no I/O; persistence,
//! background generation and messaging live in `boutique-app`.

pub mod audit;
pub mod caption;
pub mod images;
pub mod pricing;
pub mod products;
