use anyhow::Result;
use clap::{Args, Subcommand};

use crate::args::BaseArgs;
use crate::config::Settings;
use crate::login::login;

mod list;
mod view;

pub(crate) use list::run as list_activities;
pub(crate) use view::run as view_activity;

#[derive(Debug, Clone, Args)]
pub struct ActivitiesArgs {
    #[command(subcommand)]
    command: Option<ActivitiesCommands>,
}

#[derive(Debug, Clone, Subcommand)]
enum ActivitiesCommands {
    /// List remote activities, newest first
    List(ListArgs),
    /// Show the full detail record of one activity
    View(ViewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Number of activities to show
    #[arg(long, short = 'n', default_value_t = 20)]
    pub limit: usize,

    /// Offset into the activity list
    #[arg(long, default_value_t = 0)]
    pub start: usize,
}

#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Activity id
    pub id: String,
}

pub async fn run(base: BaseArgs, args: ActivitiesArgs) -> Result<()> {
    let settings = Settings::resolve(&base)?;
    let ctx = login(&settings).await?;

    match args.command {
        None => list::run(&ctx.api, 0, 20, base.json).await,
        Some(ActivitiesCommands::List(args)) => {
            list::run(&ctx.api, args.start, args.limit, base.json).await
        }
        Some(ActivitiesCommands::View(args)) => view::run(&ctx.api, &args.id, base.json).await,
    }
}
