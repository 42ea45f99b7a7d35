//! Persists what a run produced: artifacts, the script, its log and a manifest

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

const ARTIFACT_EXTENSION: &str = "html";

/// Modification times of the HTML files present in a directory
#[derive(Debug, Clone, Default)]
pub struct ArtifactSnapshot {
    seen: HashMap<PathBuf, Option<SystemTime>>,
}

impl ArtifactSnapshot {
    pub async fn take(dir: &Path) -> std::io::Result<Self> {
        let mut seen = HashMap::new();
        for (path, modified) in list_artifacts(dir).await? {
            seen.insert(path, modified);
        }
        Ok(Self { seen })
    }

    /// HTML files that are new or changed since the snapshot, sorted by path
    pub async fn changed_since(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut changed: Vec<PathBuf> = list_artifacts(dir)
            .await?
            .into_iter()
            .filter(|(path, modified)| match self.seen.get(path) {
                None => true,
                Some(before) => modified > before,
            })
            .map(|(path, _)| path)
            .collect();
        changed.sort();
        Ok(changed)
    }
}

async fn list_artifacts(dir: &Path) -> std::io::Result<Vec<(PathBuf, Option<SystemTime>)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_html = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ARTIFACT_EXTENSION));
        if !is_html {
            continue;
        }
        let meta = entry.metadata().await?;
        if meta.is_file() {
            out.push((path, meta.modified().ok()));
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed { error: String },
}

/// Everything the writer needs to persist one run
#[derive(Debug, Clone)]
pub struct RunDraft<'a> {
    pub question: &'a str,
    pub model: &'a str,
    pub image: Option<&'a Path>,
    pub script: &'a str,
    pub execution_output: &'a str,
    pub artifacts: &'a [PathBuf],
    pub status: RunStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub question: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    pub run_dir: PathBuf,
    pub script_path: PathBuf,
    pub log_path: PathBuf,
    pub artifacts: Vec<PathBuf>,
    #[serde(flatten)]
    pub status: RunStatus,
}

impl RunRecord {
    pub fn manifest_path(&self) -> PathBuf {
        self.run_dir.join("manifest.json")
    }
}

#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Copy artifacts and write script, log and manifest into a fresh run directory
    pub async fn write(&self, draft: RunDraft<'_>) -> std::io::Result<RunRecord> {
        let run_id = Uuid::new_v4();
        let created_at = Utc::now();
        let short_id: String = run_id.simple().to_string().chars().take(8).collect();
        let run_dir = self
            .output_dir
            .join(format!("{}_{}", created_at.format("%Y%m%d-%H%M%S"), short_id));
        tokio::fs::create_dir_all(&run_dir).await?;

        let script_path = run_dir.join("script.py");
        tokio::fs::write(&script_path, draft.script).await?;

        let log_path = run_dir.join("execution.log");
        tokio::fs::write(&log_path, draft.execution_output).await?;

        let mut artifacts = Vec::with_capacity(draft.artifacts.len());
        for source in draft.artifacts {
            let Some(name) = source.file_name() else {
                continue;
            };
            let dest = run_dir.join(name);
            tokio::fs::copy(source, &dest).await?;
            artifacts.push(dest);
        }

        if artifacts.is_empty() && draft.status == RunStatus::Succeeded {
            warn!("Script finished but wrote no .html artifact");
        }

        let record = RunRecord {
            run_id,
            created_at,
            question: draft.question.to_string(),
            model: draft.model.to_string(),
            image: draft.image.map(Path::to_path_buf),
            run_dir,
            script_path,
            log_path,
            artifacts,
            status: draft.status,
        };

        let manifest = serde_json::to_vec_pretty(&record).map_err(std::io::Error::other)?;
        tokio::fs::write(record.manifest_path(), manifest).await?;
        info!(
            "Saved run {} ({} artifact(s)) to {}",
            record.run_id,
            record.artifacts.len(),
            record.run_dir.display()
        );
        Ok(record)
    }
}
