use boutique_app::{config::AppConfig, context::AppContext, shutdown};
use clap::Args;
use tokio::sync::watch;
use tracing::error;

#[derive(Debug, Args)]
pub(crate) struct WorkerArgs {
    #[command(flatten)]
    config: AppConfig,
}

pub(crate) async fn run(args: WorkerArgs) -> Result<(), String> {
    let context = AppContext::from_config(&args.config)
        .await
        .map_err(|error| format!("failed to initialise: {error}"))?;

    let scheduler = context.scheduler(&args.config.jobs);
    let (stop, stopped) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(error) = shutdown::listen(stop).await {
            error!(%error, "shutdown listener failed");
        }
    });

    scheduler.run(stopped).await;

    Ok(())
}
