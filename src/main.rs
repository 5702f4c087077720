use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod activities;
mod args;
mod artifact;
mod auth;
mod config;
mod env;
mod http;
mod login;
mod menu;
mod remote;
mod session;
mod stats;
mod sync;
mod ui;
mod utils;

use crate::args::{BaseArgs, CLIArgs, NoArgs};

const CLI_VERSION: &str = env!("FITSYNC_VERSION_STRING");

#[derive(Debug, Parser)]
#[command(
    name = "fitsync",
    about = "Mirror fitness activities from the cloud into a local directory",
    version = CLI_VERSION
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Restore or create a session and show who it belongs to
    Login(CLIArgs<NoArgs>),
    /// Download activities that are not yet in the local directory
    Sync(CLIArgs<sync::SyncArgs>),
    /// Summarize the local artifact directory (offline)
    Status(CLIArgs<NoArgs>),
    /// Browse remote activities
    Activities(CLIArgs<activities::ActivitiesArgs>),
    /// Share of heart-rate samples at or below a threshold in local TCX files
    Hr(CLIArgs<stats::HrArgs>),
    /// Interactive menu
    Menu(CLIArgs<NoArgs>),
    /// Inspect or remove the stored session
    Auth(CLIArgs<auth::AuthArgs>),
    /// Read and write persistent settings
    Config(CLIArgs<config::ConfigArgs>),
}

impl Commands {
    fn base(&self) -> &BaseArgs {
        match self {
            Commands::Login(cmd) | Commands::Status(cmd) | Commands::Menu(cmd) => &cmd.base,
            Commands::Sync(cmd) => &cmd.base,
            Commands::Activities(cmd) => &cmd.base,
            Commands::Hr(cmd) => &cmd.base,
            Commands::Auth(cmd) => &cmd.base,
            Commands::Config(cmd) => &cmd.base,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var("FITSYNC_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    env::bootstrap_from_args(&argv)?;
    let cli = Cli::parse_from(argv);
    init_tracing(cli.command.base().verbose);

    match cli.command {
        Commands::Login(cmd) => login::run(cmd.base).await?,
        Commands::Sync(cmd) => sync::run(cmd.base, cmd.args).await?,
        Commands::Status(cmd) => sync::run_status(cmd.base)?,
        Commands::Activities(cmd) => activities::run(cmd.base, cmd.args).await?,
        Commands::Hr(cmd) => stats::run(cmd.base, cmd.args)?,
        Commands::Menu(cmd) => menu::run(cmd.base).await?,
        Commands::Auth(cmd) => auth::run(cmd.base, cmd.args)?,
        Commands::Config(cmd) => config::run(cmd.base, cmd.args)?,
    }

    Ok(())
}
