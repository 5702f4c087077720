use std::io::{self, IsTerminal, Write};
use std::process::{Command, Stdio};

const DEFAULT_PAGER: &str = "less -R";

fn pager_command(configured: Option<String>) -> (String, Vec<String>) {
    let line = configured
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PAGER.to_string());
    let mut words = line.split_whitespace().map(str::to_string);
    let program = words.next().unwrap_or_else(|| "less".to_string());
    (program, words.collect())
}

/// Print `output`, through `$PAGER` only when stdout is a terminal and the
/// text is taller than it.
pub fn print_with_pager(output: &str) -> io::Result<()> {
    let rows = crossterm::terminal::size().map(|(_, rows)| rows as usize).unwrap_or(24);
    if !io::stdout().is_terminal() || output.lines().count() <= rows {
        println!("{output}");
        return Ok(());
    }

    let (program, args) = pager_command(std::env::var("PAGER").ok());
    match Command::new(&program).args(&args).stdin(Stdio::piped()).spawn() {
        Ok(mut child) => {
            if let Some(mut stdin) = child.stdin.take() {
                // The pager may quit before reading everything.
                let _ = writeln!(stdin, "{output}");
            }
            child.wait()?;
        }
        Err(_) => println!("{output}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pager_falls_back_to_less() {
        assert_eq!(
            pager_command(None),
            ("less".to_string(), vec!["-R".to_string()])
        );
        assert_eq!(pager_command(Some("  ".into())).0, "less");
        assert_eq!(
            pager_command(Some("more -d".into())),
            ("more".to_string(), vec!["-d".to_string()])
        );
    }
}
