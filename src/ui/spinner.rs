use std::future::Future;
use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "];

/// Run an async operation with a spinner showing the given message.
/// Only shows spinner if stderr is a terminal.
pub async fn with_spinner<T, F: Future<Output = T>>(message: &str, fut: F) -> T {
    let spinner = progress_spinner(message);
    let result = fut.await;
    spinner.finish_and_clear();
    result
}

/// A spinner that callers update as work advances. Hidden when stderr is
/// not a terminal so piped output stays clean.
pub fn progress_spinner(message: &str) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {prefix} {msg}") {
        spinner.set_style(style.tick_strings(TICKS));
    }
    spinner.set_prefix(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
