use boutique_app::config::LoggingConfig;
use clap::{Parser, Subcommand};

mod audit;
mod inbound;
mod migrate;
mod worker;

#[derive(Debug, Parser)]
#[command(name = "boutique-app", about = "Boutique catalog manager", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate(migrate::MigrateArgs),

    /// Run generation workers until interrupted
    Worker(worker::WorkerArgs),

    /// Submit a photo with a caption as an operator
    Draft(inbound::DraftArgs),

    /// Send a text command as an operator
    Send(inbound::SendArgs),

    /// Press a preview button as an operator
    Press(inbound::PressArgs),

    /// Show recent audit entries
    Audit(audit::AuditArgs),
}

impl Cli {
    pub(crate) const fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Migrate(args) => migrate::run(args).await,
            Commands::Worker(args) => worker::run(args).await,
            Commands::Draft(args) => inbound::draft(args).await,
            Commands::Send(args) => inbound::send(args).await,
            Commands::Press(args) => inbound::press(args).await,
            Commands::Audit(args) => audit::run(args).await,
        }
    }
}
