//! Append-only persistence for snapshots and impact reports

use crate::{error::RepositoryError, report::ImpactReport, types::Snapshot};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Sink for everything the tracker produces
///
/// Stores are log-like: writes never fail because an identifier was seen
/// before. Records without an identifier get a fresh one, which is returned.
#[async_trait]
pub trait ImpactRepository: Send + Sync {
    /// Persists a single snapshot
    async fn record_snapshot(&self, snapshot: &Snapshot) -> Result<String, RepositoryError>;

    /// Persists the final analysis for an event
    async fn record_analysis_report(&self, report: &ImpactReport)
        -> Result<String, RepositoryError>;
}

fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Storage envelope: the record plus its kind
#[derive(Serialize)]
struct StoredRecord<'a, T: Serialize> {
    record_type: &'static str,
    #[serde(flatten)]
    record: &'a T,
}

/// In-memory repository
///
/// Keeps every record in insertion order; used in tests and as a local
/// fallback when no durable store is configured.
#[derive(Default)]
pub struct MemoryRepository {
    snapshots: RwLock<Vec<Snapshot>>,
    reports: RwLock<Vec<ImpactReport>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded snapshots, oldest first
    pub async fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.read().await.clone()
    }

    /// Recorded snapshots of one event, oldest first
    pub async fn snapshots_for(&self, event_id: &str) -> Vec<Snapshot> {
        self.snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect()
    }

    /// Recorded reports, oldest first
    pub async fn reports(&self) -> Vec<ImpactReport> {
        self.reports.read().await.clone()
    }
}

#[async_trait]
impl ImpactRepository for MemoryRepository {
    async fn record_snapshot(&self, snapshot: &Snapshot) -> Result<String, RepositoryError> {
        let mut doc = snapshot.clone();
        let id = doc.id.get_or_insert_with(new_record_id).clone();
        self.snapshots.write().await.push(doc);
        tracing::debug!(event_id = %snapshot.event_id, id = %id, "Stored snapshot in memory");
        Ok(id)
    }

    async fn record_analysis_report(
        &self,
        report: &ImpactReport,
    ) -> Result<String, RepositoryError> {
        let mut doc = report.clone();
        let id = doc.id.get_or_insert_with(new_record_id).clone();
        self.reports.write().await.push(doc);
        tracing::debug!(event_id = %report.event_id, id = %id, "Stored impact report in memory");
        Ok(id)
    }
}

/// JSON-lines file repository for offline analysis
///
/// Every record becomes one line tagged with `record_type` (`snapshot` or
/// `analysis`). Appends from concurrent writers are serialized.
pub struct JsonlRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append<T: Serialize + Sync>(
        &self,
        record_type: &'static str,
        record: &T,
    ) -> Result<(), RepositoryError> {
        let mut line = serde_json::to_string(&StoredRecord {
            record_type,
            record,
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl ImpactRepository for JsonlRepository {
    async fn record_snapshot(&self, snapshot: &Snapshot) -> Result<String, RepositoryError> {
        let mut doc = snapshot.clone();
        let id = doc.id.get_or_insert_with(new_record_id).clone();
        self.append("snapshot", &doc).await?;
        Ok(id)
    }

    async fn record_analysis_report(
        &self,
        report: &ImpactReport,
    ) -> Result<String, RepositoryError> {
        let mut doc = report.clone();
        let id = doc.id.get_or_insert_with(new_record_id).clone();
        self.append("analysis", &doc).await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{EventAnalyzer, ImpactAnalysisEngine};
    use crate::types::{Metadata, PriceMap};
    use chrono::Utc;
    use std::sync::Arc;

    fn snapshot(event_id: &str, sequence: u32) -> Snapshot {
        Snapshot {
            id: None,
            event_id: event_id.to_string(),
            urgency: "immediate".to_string(),
            captured_at: Utc::now(),
            sequence,
            interval_seconds: 600,
            initial_capture: sequence == 0,
            metadata: Metadata::new(),
            crypto: PriceMap::new(),
            indices: PriceMap::new(),
            crypto_error: None,
            index_error: None,
        }
    }

    #[tokio::test]
    async fn test_memory_repository_assigns_ids() {
        let repo = MemoryRepository::new();

        let first = repo.record_snapshot(&snapshot("a", 0)).await.unwrap();
        let second = repo.record_snapshot(&snapshot("b", 0)).await.unwrap();
        assert_ne!(first, second);

        let stored = repo.snapshots().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].id.as_deref(), Some(first.as_str()));
        assert_eq!(repo.snapshots_for("b").await.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_repository_accepts_duplicate_ids() {
        let repo = MemoryRepository::new();
        let mut doc = snapshot("a", 0);
        doc.id = Some("fixed".to_string());

        assert_eq!(repo.record_snapshot(&doc).await.unwrap(), "fixed");
        assert_eq!(repo.record_snapshot(&doc).await.unwrap(), "fixed");
        assert_eq!(repo.snapshots().await.len(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_repository_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("market_impact_data.jsonl");
        let repo = JsonlRepository::new(&path);

        repo.record_snapshot(&snapshot("post-1", 0)).await.unwrap();
        let report = ImpactAnalysisEngine::default()
            .analyze_event("post-1", &[snapshot("post-1", 0)], &Metadata::new(), Utc::now())
            .unwrap();
        let report_id = repo.record_analysis_report(&report).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["record_type"], "snapshot");
        assert_eq!(lines[0]["event_id"], "post-1");
        assert!(lines[0]["_id"].is_string());
        assert_eq!(lines[1]["record_type"], "analysis");
        assert_eq!(lines[1]["_id"], report_id.as_str());
        assert!(lines[1]["report"].is_string());
    }

    #[tokio::test]
    async fn test_jsonl_repository_concurrent_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("impact.jsonl");
        let repo = Arc::new(JsonlRepository::new(&path));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let doc = snapshot("e", i);
                    repo.record_snapshot(&doc).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 20);
        for line in content.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["event_id"], "e");
        }
    }
}
