use crate::output::{print_json, print_table};
use sitectl_core::history::{self, CommandSource};
use std::path::Path;

pub fn run(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let entries = history::recent(root, limit)?;

    if json {
        print_json(&entries)?;
        return Ok(());
    }
    if entries.is_empty() {
        println!("No commands recorded yet.");
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                match e.source {
                    CommandSource::Text => "text",
                    CommandSource::Ai => "ai",
                }
                .to_string(),
                if e.success { "ok" } else { "failed" }.to_string(),
                e.command.clone(),
                e.message.clone().or_else(|| e.error.clone()).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["WHEN", "SOURCE", "RESULT", "COMMAND", "DETAIL"], rows);
    Ok(())
}
