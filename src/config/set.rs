use std::path::Path;

use anyhow::Result;

use crate::ui::{print_command_status, CommandStatus};

pub fn run(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut cfg = super::load_file(path);

    cfg.set_field(key, value)?;

    super::save_file(path, &cfg)?;

    print_command_status(CommandStatus::Success, &format!("Set {key} = {value}"));
    Ok(())
}

pub fn unset(path: &Path, key: &str) -> Result<()> {
    let mut cfg = super::load_file(path);

    if cfg.get_field(key).is_none() || !cfg.unset_field(key) {
        print_command_status(CommandStatus::Warning, &format!("{key} was not set"));
        return Ok(());
    }

    super::save_file(path, &cfg)?;

    print_command_status(CommandStatus::Success, &format!("Unset {key}"));
    Ok(())
}
