use std::path::PathBuf;

use boutique_app::{
    config::AppConfig,
    context::AppContext,
    dispatch::{Dispatched, Inbound},
    domain::audit::records::ActorId,
    messaging::ConversationId,
};
use clap::Args;
use uuid::Uuid;

/// Who is acting, and where replies go.
#[derive(Debug, Args)]
pub(crate) struct OperatorArgs {
    /// Messaging user id of the operator
    #[arg(long)]
    actor: i64,

    /// Conversation replies are sent to
    #[arg(long)]
    conversation: i64,
}

#[derive(Debug, Args)]
pub(crate) struct DraftArgs {
    #[command(flatten)]
    operator: OperatorArgs,

    /// Photo to upload
    #[arg(long)]
    photo: PathBuf,

    /// Caption with `Title:` and `Price:` lines
    #[arg(long)]
    caption: Option<String>,

    #[command(flatten)]
    config: AppConfig,
}

#[derive(Debug, Args)]
pub(crate) struct SendArgs {
    #[command(flatten)]
    operator: OperatorArgs,

    /// Message text, e.g. `/soldout D-1042`
    text: String,

    #[command(flatten)]
    config: AppConfig,
}

#[derive(Debug, Args)]
pub(crate) struct PressArgs {
    #[command(flatten)]
    operator: OperatorArgs,

    /// Button callback data, e.g. `approve:<product uuid>`
    data: String,

    #[command(flatten)]
    config: AppConfig,
}

pub(crate) async fn draft(args: DraftArgs) -> Result<(), String> {
    let bytes = tokio::fs::read(&args.photo)
        .await
        .map_err(|error| format!("failed to read {}: {error}", args.photo.display()))?;

    let inbound = Inbound::Photo {
        actor: ActorId(args.operator.actor),
        conversation: ConversationId(args.operator.conversation),
        caption: args.caption,
        bytes,
    };

    dispatch(&args.config, inbound).await
}

pub(crate) async fn send(args: SendArgs) -> Result<(), String> {
    let inbound = Inbound::Text {
        actor: ActorId(args.operator.actor),
        conversation: ConversationId(args.operator.conversation),
        text: args.text,
    };

    dispatch(&args.config, inbound).await
}

pub(crate) async fn press(args: PressArgs) -> Result<(), String> {
    let inbound = Inbound::Interaction {
        actor: ActorId(args.operator.actor),
        conversation: ConversationId(args.operator.conversation),
        id: Uuid::now_v7().simple().to_string(),
        data: args.data,
    };

    dispatch(&args.config, inbound).await
}

async fn dispatch(config: &AppConfig, inbound: Inbound) -> Result<(), String> {
    let context = AppContext::from_config(config)
        .await
        .map_err(|error| format!("failed to initialise: {error}"))?;

    let outcome = context
        .dispatcher
        .dispatch(inbound)
        .await
        .map_err(|error| format!("failed to handle input: {error}"))?;

    match outcome {
        Dispatched::Handled => println!("handled"),
        Dispatched::Ignored => println!("ignored: actor is not an admin"),
    }

    Ok(())
}
