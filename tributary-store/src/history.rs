//! Sync job history.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use tributary_core::{ProviderKind, SyncJob};
use uuid::Uuid;

use crate::error::StoreError;
use crate::persistence::{load_json_if_exists, save_json};

/// Maximum number of finished jobs kept per provider.
pub const MAX_HISTORY_ENTRIES: usize = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    jobs: Vec<SyncJob>,
}

/// Finished sync jobs, newest last, bounded per provider.
///
/// When created with [`JobHistory::load`], every `record` rewrites the
/// backing file.
#[derive(Debug)]
pub struct JobHistory {
    path: Option<PathBuf>,
    max_entries: usize,
    entries: RwLock<HashMap<ProviderKind, VecDeque<SyncJob>>>,
}

impl Default for JobHistory {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl JobHistory {
    /// Creates a history that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            max_entries: MAX_HISTORY_ENTRIES,
            entries: RwLock::default(),
        }
    }

    /// Loads the history file at `path`, starting empty if it is missing.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file: HistoryFile = load_json_if_exists(&path).await?.unwrap_or_default();

        let mut entries: HashMap<ProviderKind, VecDeque<SyncJob>> = HashMap::new();
        for job in file.jobs {
            entries.entry(job.provider).or_default().push_back(job);
        }
        for jobs in entries.values_mut() {
            jobs.make_contiguous().sort_by_key(|j| j.started_at);
        }

        Ok(Self {
            path: Some(path),
            max_entries: MAX_HISTORY_ENTRIES,
            entries: RwLock::new(entries),
        })
    }

    /// Sets the per-provider bound.
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }

    /// Appends a job, evicting the oldest one past the bound.
    pub async fn record(&self, job: SyncJob) -> Result<(), StoreError> {
        let snapshot = {
            let mut entries = self.entries.write().await;
            let jobs = entries.entry(job.provider).or_default();
            jobs.push_back(job);
            while jobs.len() > self.max_entries {
                jobs.pop_front();
            }

            self.path.as_ref().map(|_| HistoryFile {
                jobs: entries.values().flatten().cloned().collect(),
            })
        };

        if let (Some(path), Some(file)) = (&self.path, snapshot) {
            debug!(path = %path.display(), jobs = file.jobs.len(), "Saving job history");
            save_json(path, &file).await?;
        }
        Ok(())
    }

    /// Most recent job for a provider.
    pub async fn latest(&self, provider: ProviderKind) -> Option<SyncJob> {
        self.entries
            .read()
            .await
            .get(&provider)
            .and_then(|jobs| jobs.back().cloned())
    }

    /// Up to `limit` jobs for a provider, newest first.
    pub async fn recent(&self, provider: ProviderKind, limit: usize) -> Vec<SyncJob> {
        self.entries
            .read()
            .await
            .get(&provider)
            .map(|jobs| jobs.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Looks a job up by id.
    pub async fn find(&self, id: Uuid) -> Option<SyncJob> {
        self.entries
            .read()
            .await
            .values()
            .flatten()
            .find(|j| j.id == id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tributary_core::{FailureReason, SyncMode};

    fn job(provider: ProviderKind, minute: i64) -> SyncJob {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minute);
        let mut job = SyncJob::new(provider, SyncMode::Incremental, start);
        job.succeed(start + Duration::seconds(5));
        job
    }

    #[tokio::test]
    async fn test_bounded_per_provider() {
        let history = JobHistory::in_memory().with_max_entries(3);
        for i in 0..5 {
            history.record(job(ProviderKind::GitHub, i)).await.unwrap();
        }
        history.record(job(ProviderKind::YouTube, 0)).await.unwrap();

        let recent = history.recent(ProviderKind::GitHub, 10).await;
        assert_eq!(recent.len(), 3);
        assert!(recent[0].started_at > recent[2].started_at);
        assert_eq!(history.recent(ProviderKind::YouTube, 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_latest_and_find() {
        let history = JobHistory::in_memory();
        assert!(history.latest(ProviderKind::Airtable).await.is_none());

        let first = job(ProviderKind::Airtable, 0);
        let mut second = job(ProviderKind::Airtable, 1);
        second.fail(FailureReason::QuotaExhausted, second.started_at);
        let id = first.id;
        history.record(first).await.unwrap();
        history.record(second.clone()).await.unwrap();

        assert_eq!(history.latest(ProviderKind::Airtable).await.unwrap().id, second.id);
        assert_eq!(history.find(id).await.unwrap().id, id);
    }

    #[tokio::test]
    async fn test_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let history = JobHistory::load(&path).await.unwrap();
        history.record(job(ProviderKind::Mailchimp, 0)).await.unwrap();
        history.record(job(ProviderKind::Mailchimp, 1)).await.unwrap();

        let reloaded = JobHistory::load(&path).await.unwrap();
        let recent = reloaded.recent(ProviderKind::Mailchimp, 5).await;
        assert_eq!(recent.len(), 2);
        assert!(recent[0].started_at > recent[1].started_at);
    }
}
