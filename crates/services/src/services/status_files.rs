use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

const STATUS_FILE_PREFIX: &str = "agent-";
const STATUS_FILE_SUFFIX: &str = ".status";

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusFile {
    pub agent_id: String,
    pub status: serde_json::Value,
    #[ts(type = "Date | null")]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Narrow capability over the directory of `agent-<id>.status` files that
/// running agents drop for out-of-band progress reporting.
pub trait StatusSource: Send + Sync {
    fn list(&self) -> std::io::Result<Vec<AgentStatusFile>>;
    fn read(&self, agent_id: &str) -> std::io::Result<Option<AgentStatusFile>>;
}

#[derive(Clone)]
pub struct FilesystemStatusSource {
    dir: PathBuf,
}

impl FilesystemStatusSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn load(&self, path: &std::path::Path, agent_id: &str) -> std::io::Result<AgentStatusFile> {
        let raw = std::fs::read_to_string(path)?;
        let status = serde_json::from_str(&raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.trim().to_string()));
        let modified_at = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(AgentStatusFile {
            agent_id: agent_id.to_string(),
            status,
            modified_at,
        })
    }
}

impl StatusSource for FilesystemStatusSource {
    fn list(&self) -> std::io::Result<Vec<AgentStatusFile>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(agent_id) = name
                .strip_prefix(STATUS_FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(STATUS_FILE_SUFFIX))
            else {
                continue;
            };
            match self.load(&entry.path(), agent_id) {
                Ok(file) => files.push(file),
                Err(err) => {
                    tracing::warn!("Failed to read status file {name}: {err}");
                }
            }
        }

        files.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(files)
    }

    fn read(&self, agent_id: &str) -> std::io::Result<Option<AgentStatusFile>> {
        let path = self
            .dir
            .join(format!("{STATUS_FILE_PREFIX}{agent_id}{STATUS_FILE_SUFFIX}"));
        match self.load(&path, agent_id) {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_lists_empty() {
        let source = FilesystemStatusSource::new(PathBuf::from("/nonexistent/mc-status"));
        assert!(source.list().unwrap().is_empty());
    }

    #[test]
    fn scans_only_status_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("agent-alpha.status"),
            r#"{"phase": "testing"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("agent-beta.status"), "plain text").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = FilesystemStatusSource::new(dir.path().to_path_buf());
        let files = source.list().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].agent_id, "alpha");
        assert_eq!(files[0].status["phase"], "testing");
        // non-JSON content degrades to a string status
        assert_eq!(
            files[1].status,
            serde_json::Value::String("plain text".to_string())
        );
    }

    #[test]
    fn read_single_agent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("agent-x.status"), r#"{"ok": true}"#).unwrap();

        let source = FilesystemStatusSource::new(dir.path().to_path_buf());
        let file = source.read("x").unwrap().expect("status file");
        assert_eq!(file.status["ok"], true);
        assert!(source.read("missing").unwrap().is_none());
    }
}
