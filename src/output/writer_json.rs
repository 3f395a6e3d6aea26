use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::models::{JobId, JobStatusRecord, ScanResult};

pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Write the final scan payload as pretty JSON.
pub fn write_result(path: &Path, result: &ScanResult) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(result)?;
    fs::write(path, data)?;
    Ok(())
}

#[derive(Serialize)]
struct StatusLine<'a> {
    job_id: &'a JobId,
    #[serde(flatten)]
    record: &'a JobStatusRecord,
}

/// Append one status observation per line.
pub fn append_status_jsonl(path: &Path, job_id: &JobId, records: &[&JobStatusRecord]) -> anyhow::Result<()> {
    let mut f = OpenOptions::new().append(true).create(true).open(path)?;
    for record in records {
        let line = serde_json::to_string(&StatusLine { job_id, record })?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobState, Phase, ScanPayload};

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("recon_hunter_{}_{}", name, std::process::id()));
        ensure_dir(&dir).unwrap();
        dir
    }

    #[test]
    fn test_write_result_round_trips() {
        let dir = scratch_dir("result");
        let path = dir.join("job.json");
        let result = ScanResult::new("example.com", ScanPayload::Vuln { vulnerabilities: vec![], total_vulnerabilities: 0 });

        write_result(&path, &result).unwrap();
        let back: ScanResult = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, result);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_status_lines_are_appended() {
        let dir = scratch_dir("status");
        let path = dir.join("job.status.jsonl");
        let id = JobId::from("j1");
        let a = JobStatusRecord::new(JobState::Running, 10, Phase::SubdomainEnum, "a");
        let b = JobStatusRecord::new(JobState::Completed, 100, Phase::Completed, "b");

        append_status_jsonl(&path, &id, &[&a]).unwrap();
        append_status_jsonl(&path, &id, &[&b]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["job_id"], "j1");
        assert_eq!(lines[1]["status"], "completed");
        fs::remove_dir_all(dir).ok();
    }
}
