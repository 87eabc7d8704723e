//! Catalog Config

use clap::Args;

use crate::domain::audit::records::ActorId;

/// Catalog and operator settings.
#[derive(Debug, Args)]
pub struct CatalogConfig {
    /// Base URL images are served from, e.g. `https://shop.example`
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8080")]
    pub public_base_url: String,

    /// Comma separated messaging user ids allowed to run commands
    #[arg(long, env = "ADMIN_USER_IDS", value_delimiter = ',', required = true)]
    pub admin_user_ids: Vec<i64>,
}

impl CatalogConfig {
    /// The allowlisted operators.
    pub fn admins(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.admin_user_ids.iter().copied().map(ActorId)
    }
}
