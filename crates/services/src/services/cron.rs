use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum CronError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Malformed cron jobs file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CronSchedule {
    pub kind: String,
    pub expr: String,
    pub tz: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CronPayload {
    pub kind: String,
    pub message: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
pub struct CronState {
    pub next_run_at_ms: Option<i64>,
    pub last_run_at_ms: Option<i64>,
    pub last_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub payload: CronPayload,
    #[serde(default)]
    pub state: CronState,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CronJobsFile {
    #[serde(default)]
    jobs: Vec<CronJob>,
}

/// The scheduler runs elsewhere and owns this file; we only render its state.
/// A missing file means no jobs are configured yet.
pub fn read_jobs(path: &Path) -> Result<Vec<CronJob>, CronError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let file: CronJobsFile = serde_json::from_str(&raw)?;
    Ok(file.jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = read_jobs(&dir.path().join("jobs.json")).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn reads_camel_case_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(
            &path,
            r#"{
                "jobs": [{
                    "id": "morning-report",
                    "name": "Morning report",
                    "schedule": {"kind": "cron", "expr": "0 7 * * *", "tz": "America/Chicago"},
                    "payload": {"kind": "prompt", "message": "daily summary", "model": "claude-haiku-4-5"},
                    "state": {"nextRunAtMs": 1700000000000, "lastStatus": "ok"}
                }]
            }"#,
        )
        .unwrap();

        let jobs = read_jobs(&path).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].enabled);
        assert_eq!(jobs[0].schedule.expr, "0 7 * * *");
        assert_eq!(jobs[0].state.next_run_at_ms, Some(1700000000000));
        assert_eq!(jobs[0].state.last_status.as_deref(), Some("ok"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "{broken").unwrap();
        assert!(matches!(read_jobs(&path), Err(CronError::Parse(_))));
    }
}
