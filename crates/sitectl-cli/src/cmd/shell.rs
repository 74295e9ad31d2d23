use super::run::{RunOptions, Runner};
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

const PROMPT: &str = "sitectl> ";

pub fn run(root: &Path, options: &RunOptions, json: bool) -> anyhow::Result<()> {
    let mut runner = Runner::new(root, options.clone())?;
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();

    if interactive {
        println!("Type a command, or `exit` to quit.");
    }

    let mut ok = 0usize;
    let mut failed = 0usize;
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("{PROMPT}");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        if matches!(text.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        match runner.handle(text, json) {
            Ok(()) => ok += 1,
            Err(e) => {
                failed += 1;
                eprintln!("error: {e:#}");
            }
        }
    }

    if !json {
        println!("{ok} succeeded, {failed} failed");
    }
    Ok(())
}
