use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Load `.env` files before clap parses, so `env = "..."` arguments see them.
pub fn bootstrap_from_args(args: &[OsString]) -> Result<()> {
    let explicit = env_file_arg(args).or_else(|| std::env::var_os("FITSYNC_ENV_FILE").map(PathBuf::from));
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    for (key, value) in collect_env(&cwd, explicit.as_deref())? {
        std::env::set_var(key, value);
    }
    Ok(())
}

/// Variables to export, lowest-precedence file first. Values already present
/// in the process environment are never replaced.
fn collect_env(cwd: &Path, explicit: Option<&Path>) -> Result<Vec<(String, String)>> {
    let files = match explicit {
        Some(path) => vec![cwd.join(path)],
        None => vec![cwd.join(".env"), cwd.join(".env.local")],
    };

    let mut loaded = HashMap::new();
    for file in files {
        if explicit.is_none() && !file.exists() {
            continue;
        }
        let parsed = dotenvy::from_path_iter(&file)
            .with_context(|| format!("failed to read env file {}", file.display()))?;
        for item in parsed {
            let (key, value) =
                item.with_context(|| format!("failed to parse env file {}", file.display()))?;
            if std::env::var_os(&key).is_none() {
                loaded.insert(key, value);
            }
        }
    }

    let mut envs: Vec<(String, String)> = loaded.into_iter().collect();
    envs.sort();
    Ok(envs)
}

fn env_file_arg(args: &[OsString]) -> Option<PathBuf> {
    let mut explicit = None;
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let Some(arg) = arg.to_str() else {
            continue;
        };
        if arg == "--" {
            break;
        }
        if arg == "--env-file" {
            explicit = iter.next().map(PathBuf::from);
        } else if let Some(value) = arg.strip_prefix("--env-file=") {
            explicit = Some(PathBuf::from(value));
        }
    }
    explicit
}
