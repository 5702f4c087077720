use std::io::{self, IsTerminal};

use dialoguer::console::{Key, Term};
use dialoguer::{theme::ColorfulTheme, Input, Password};

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt interrupted")]
    Interrupted,
    #[error("interactive input requires a TTY")]
    NotInteractive,
    #[error(transparent)]
    Io(io::Error),
}

impl From<dialoguer::Error> for PromptError {
    fn from(err: dialoguer::Error) -> Self {
        #[allow(unreachable_patterns)]
        match err {
            dialoguer::Error::IO(err) => match err.kind() {
                io::ErrorKind::Interrupted | io::ErrorKind::UnexpectedEof => {
                    PromptError::Interrupted
                }
                _ => PromptError::Io(err),
            },
            other => PromptError::Io(io::Error::other(other.to_string())),
        }
    }
}

pub fn require_tty() -> Result<(), PromptError> {
    if std::io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(PromptError::NotInteractive)
    }
}

pub fn prompt_text(label: &str) -> Result<String, PromptError> {
    require_tty()?;
    let value: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .interact_text()?;
    Ok(value.trim().to_string())
}

pub fn prompt_secret(label: &str) -> Result<String, PromptError> {
    require_tty()?;
    Ok(Password::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .interact()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKey {
    Char(char),
    Back,
    Interrupted,
}

/// Block for a single keypress. `q` and Escape mean back, Ctrl+C interrupts.
pub fn read_menu_key() -> Result<MenuKey, PromptError> {
    require_tty()?;
    let key = Term::stderr().read_key().map_err(|err| match err.kind() {
        io::ErrorKind::Interrupted => PromptError::Interrupted,
        _ => PromptError::Io(err),
    })?;
    Ok(match key {
        Key::Char('q') | Key::Char('Q') | Key::Escape => MenuKey::Back,
        Key::CtrlC => MenuKey::Interrupted,
        Key::Char(ch) => MenuKey::Char(ch),
        Key::Enter => MenuKey::Char('\n'),
        _ => MenuKey::Char('\0'),
    })
}
