//! Audit Records

use std::fmt;

use boutique::audit::AuditAction;
use jiff::Timestamp;
use serde_json::Value;

use crate::domain::catalog::records::ProductUuid;

/// Identity of whoever performed a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(pub i64);

impl ActorId {
    /// Attribution for background work.
    pub const SYSTEM: Self = Self(0);
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Audit Record
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub id: i64,
    pub actor: ActorId,
    pub action: AuditAction,
    pub product_uuid: Option<ProductUuid>,
    pub payload: Value,
    pub created_at: Timestamp,
}

/// New Audit Entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor: ActorId,
    pub action: AuditAction,
    pub product_uuid: Option<ProductUuid>,
    pub payload: Value,
}
