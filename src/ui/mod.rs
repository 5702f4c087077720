mod pager;
mod prompt;
mod spinner;
mod status;
mod table;

pub use pager::print_with_pager;

pub use prompt::{prompt_secret, prompt_text, read_menu_key, MenuKey, PromptError};

pub use spinner::{progress_spinner, with_spinner};

pub use status::{print_command_status, CommandStatus};

pub use table::{listing_table, truncate};
