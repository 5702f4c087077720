//! Interactive single-keypress menu.
//!
//! Navigation is a small state machine ([`MenuState::on_key`]) kept separate
//! from terminal IO so it can be exercised without a TTY.

use anyhow::Result;
use dialoguer::console::style;

use crate::activities::{list_activities, view_activity};
use crate::args::BaseArgs;
use crate::auth::{self, AuthArgs, AuthSubcommand, TokenArgs};
use crate::config::Settings;
use crate::login;
use crate::remote::ArtifactFormat;
use crate::stats::{self, HrArgs};
use crate::sync::{self, SyncArgs};
use crate::ui::{
    print_command_status, prompt_text, read_menu_key, CommandStatus, MenuKey, PromptError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Activities,
    Sync,
    Statistics,
    Session,
}

impl Category {
    const ALL: [Category; 4] = [
        Category::Activities,
        Category::Sync,
        Category::Statistics,
        Category::Session,
    ];

    fn title(self) -> &'static str {
        match self {
            Category::Activities => "Activities",
            Category::Sync => "Sync",
            Category::Statistics => "Statistics",
            Category::Session => "Session",
        }
    }

    fn actions(self) -> &'static [Action] {
        match self {
            Category::Activities => &[Action::ListActivities, Action::ViewActivity],
            Category::Sync => &[
                Action::Sync(ArtifactFormat::Fit),
                Action::Sync(ArtifactFormat::Json),
                Action::Sync(ArtifactFormat::Tcx),
                Action::Sync(ArtifactFormat::Gpx),
                Action::LocalStatus,
            ],
            Category::Statistics => &[Action::LowHeartRate],
            Category::Session => &[Action::Login, Action::ShowToken, Action::Logout],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ListActivities,
    ViewActivity,
    Sync(ArtifactFormat),
    LocalStatus,
    LowHeartRate,
    Login,
    ShowToken,
    Logout,
}

impl Action {
    fn label(self) -> String {
        match self {
            Action::ListActivities => "List recent activities".to_string(),
            Action::ViewActivity => "View activity details".to_string(),
            Action::Sync(format) => format!("Download new activities ({format})"),
            Action::LocalStatus => "Show local artifacts".to_string(),
            Action::LowHeartRate => "Low heart-rate share of TCX samples".to_string(),
            Action::Login => "Log in / check session".to_string(),
            Action::ShowToken => "Show stored token".to_string(),
            Action::Logout => "Log out".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuState {
    Categories,
    Category(Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Stay,
    Go(MenuState),
    Run(Action),
    Quit,
}

fn digit_index(ch: char) -> Option<usize> {
    ch.to_digit(10).and_then(|d| (d as usize).checked_sub(1))
}

impl MenuState {
    fn on_key(self, key: MenuKey) -> Transition {
        match (self, key) {
            (_, MenuKey::Interrupted) => Transition::Quit,
            (MenuState::Categories, MenuKey::Back) => Transition::Quit,
            (MenuState::Category(_), MenuKey::Back) => Transition::Go(MenuState::Categories),
            (MenuState::Categories, MenuKey::Char(ch)) => digit_index(ch)
                .and_then(|i| Category::ALL.get(i))
                .map(|c| Transition::Go(MenuState::Category(*c)))
                .unwrap_or(Transition::Stay),
            (MenuState::Category(category), MenuKey::Char(ch)) => digit_index(ch)
                .and_then(|i| category.actions().get(i))
                .map(|a| Transition::Run(*a))
                .unwrap_or(Transition::Stay),
        }
    }

    fn render(self) -> String {
        let (title, items): (&str, Vec<String>) = match self {
            MenuState::Categories => (
                "fitsync",
                Category::ALL.iter().map(|c| c.title().to_string()).collect(),
            ),
            MenuState::Category(category) => (
                category.title(),
                category.actions().iter().map(|a| a.label()).collect(),
            ),
        };
        let mut out = format!("\n{}\n", style(title).bold());
        for (i, item) in items.iter().enumerate() {
            out.push_str(&format!("  {} {item}\n", style(format!("[{}]", i + 1)).cyan()));
        }
        let back = match self {
            MenuState::Categories => "quit",
            MenuState::Category(_) => "back",
        };
        out.push_str(&format!("  {} {back}", style("[q]").dim()));
        out
    }
}

pub async fn run(base: BaseArgs) -> Result<()> {
    let base = BaseArgs {
        json: false,
        ..base
    };
    Settings::resolve(&base)?;

    let mut state = MenuState::Categories;
    loop {
        eprintln!("{}", state.render());
        let key = match read_menu_key() {
            Ok(key) => key,
            Err(PromptError::Interrupted) => MenuKey::Interrupted,
            Err(err) => return Err(err.into()),
        };

        match state.on_key(key) {
            Transition::Stay => {}
            Transition::Go(next) => state = next,
            Transition::Quit => return Ok(()),
            Transition::Run(action) => {
                if let Err(err) = perform(&base, action).await {
                    print_command_status(CommandStatus::Error, &format!("{err:#}"));
                }
            }
        }
    }
}

async fn perform(base: &BaseArgs, action: Action) -> Result<()> {
    match action {
        Action::ListActivities => {
            let ctx = login::login(&Settings::resolve(base)?).await?;
            list_activities(&ctx.api, 0, 20, false).await
        }
        Action::ViewActivity => {
            let id = prompt_text("Activity id")?;
            let ctx = login::login(&Settings::resolve(base)?).await?;
            view_activity(&ctx.api, &id, false).await
        }
        Action::Sync(format) => {
            sync::run(
                base.clone(),
                SyncArgs {
                    format: Some(format),
                    force: false,
                    page_size: None,
                    delay_ms: None,
                },
            )
            .await
        }
        Action::LocalStatus => sync::run_status(base.clone()),
        Action::LowHeartRate => stats::run(
            base.clone(),
            HrArgs {
                threshold: None,
                files: Vec::new(),
            },
        ),
        Action::Login => login::run(base.clone()).await,
        Action::ShowToken => auth::run(
            base.clone(),
            AuthArgs {
                command: AuthSubcommand::Token(TokenArgs { show: false }),
            },
        ),
        Action::Logout => auth::run(
            base.clone(),
            AuthArgs {
                command: AuthSubcommand::Logout,
            },
        ),
    }
}
