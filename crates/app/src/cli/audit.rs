use boutique_app::{
    database::{self, Db},
    domain::catalog::{CatalogService, PgCatalogService, records::ProductUuid},
};
use clap::Args;

#[derive(Debug, Args)]
pub(crate) struct AuditArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Only entries for this product
    #[arg(long)]
    product: Option<ProductUuid>,

    /// Number of entries to show
    #[arg(long, default_value_t = 20)]
    limit: u32,
}

pub(crate) async fn run(args: AuditArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url, 1)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    let catalog = PgCatalogService::new(Db::new(pool));

    let entries = catalog
        .list_audit(args.product, args.limit)
        .await
        .map_err(|error| format!("failed to list audit entries: {error}"))?;

    if entries.is_empty() {
        println!("no audit entries");
        return Ok(());
    }

    for entry in entries {
        println!("id: {}", entry.id);
        println!("at: {}", entry.created_at);
        println!("actor: {}", entry.actor);
        println!("action: {}", entry.action);
        println!(
            "product: {}",
            entry
                .product_uuid
                .map_or_else(|| "none".to_string(), |uuid| uuid.to_string())
        );
        println!("payload: {}", entry.payload);
        println!();
    }

    Ok(())
}
