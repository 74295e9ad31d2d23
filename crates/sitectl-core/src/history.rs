use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    Text,
    Ai,
}

/// One executed command, stored as a line of `.sitectl/history.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub source: CommandSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn succeeded(command: &str, source: CommandSource, action: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.to_string(),
            source,
            action: Some(action.to_string()),
            success: true,
            message: Some(message.to_string()),
            error: None,
        }
    }

    pub fn failed(command: &str, source: CommandSource, action: Option<&str>, error: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.to_string(),
            source,
            action: action.map(str::to_string),
            success: false,
            message: None,
            error: Some(error.to_string()),
        }
    }
}

/// Append one entry as a single JSON line.
pub fn append(root: &Path, entry: &HistoryEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    crate::io::append_text(&paths::history_path(root), &line)
}

/// All readable entries, oldest first. Malformed lines are skipped.
pub fn load(root: &Path) -> Result<Vec<HistoryEntry>> {
    let path = paths::history_path(root);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(&path)?;
    let mut entries = Vec::new();
    for (i, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line = i + 1, "skipping malformed history line: {e}"),
        }
    }
    Ok(entries)
}

/// The last `n` entries, newest first.
pub fn recent(root: &Path, n: usize) -> Result<Vec<HistoryEntry>> {
    let mut entries = load(root)?;
    entries.reverse();
    entries.truncate(n);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_then_load() {
        let dir = TempDir::new().unwrap();
        let ok = HistoryEntry::succeeded("site status", CommandSource::Text, "status", "12/13 available");
        let bad = HistoryEntry::failed("fly to mars", CommandSource::Ai, None, "unknown action: fly");
        append(dir.path(), &ok).unwrap();
        append(dir.path(), &bad).unwrap();

        let entries = load(dir.path()).unwrap();
        assert_eq!(entries, vec![ok, bad]);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let entry = HistoryEntry::succeeded("list orders", CommandSource::Text, "list_orders", "3 orders");
        append(dir.path(), &entry).unwrap();
        crate::io::append_text(&paths::history_path(dir.path()), "{\"truncated\": \n\n").unwrap();
        append(dir.path(), &entry).unwrap();
        assert_eq!(load(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            let entry = HistoryEntry::succeeded(&format!("cmd {i}"), CommandSource::Text, "status", "ok");
            append(dir.path(), &entry).unwrap();
        }
        let recent = recent(dir.path(), 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].command, "cmd 4");
        assert_eq!(recent[1].command, "cmd 3");
    }

    #[test]
    fn source_serializes_lowercase() {
        let entry = HistoryEntry::failed("x", CommandSource::Ai, Some("add_product"), "boom");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["source"], "ai");
        assert!(json.get("message").is_none());
    }
}
