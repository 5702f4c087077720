use std::path::PathBuf;

use clap::Args;

#[derive(Debug, Clone, Default, Args)]
pub struct BaseArgs {
    /// Output as JSON
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Enable debug logging (or set FITSYNC_LOG)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Account email (or via EMAIL)
    #[arg(long, env = "EMAIL", global = true)]
    pub email: Option<String>,

    /// Account password (or via PASSWORD)
    #[arg(long, env = "PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Token store directory (or via GARMINTOKENS)
    #[arg(long, env = "GARMINTOKENS", global = true)]
    pub tokenstore: Option<String>,

    /// File holding a base64-encoded token bundle (or via GARMINTOKENS_BASE64)
    #[arg(long, env = "GARMINTOKENS_BASE64", global = true)]
    pub tokenstore_base64: Option<String>,

    /// Override API URL (or via FITSYNC_API_URL)
    #[arg(long, env = "FITSYNC_API_URL", hide_env_values = true, global = true)]
    pub api_url: Option<String>,

    /// Override authentication URL (or via FITSYNC_AUTH_URL)
    #[arg(long, env = "FITSYNC_AUTH_URL", hide_env_values = true, global = true)]
    pub auth_url: Option<String>,

    /// Local artifact directory (or via FITSYNC_EXPORT_DIR)
    #[arg(short = 'd', long = "dir", env = "FITSYNC_EXPORT_DIR", global = true)]
    pub export_dir: Option<PathBuf>,

    /// Path to a .env file to load before running commands.
    #[arg(long, env = "FITSYNC_ENV_FILE", hide_env_values = true)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct CLIArgs<T: Args> {
    #[command(flatten)]
    pub base: BaseArgs,

    #[command(flatten)]
    pub args: T,
}

/// For subcommands that take only the shared arguments.
#[derive(Debug, Clone, Args)]
pub struct NoArgs {}
