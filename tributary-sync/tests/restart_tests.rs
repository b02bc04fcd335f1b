//! Quota and checkpoint state written by one engine instance is honoured by
//! the next one, using the on-disk JSON stores.

mod common;

use std::path::Path;
use std::sync::Arc;

use tributary_core::{FailureReason, FixedClock, JobState, ProviderKind, SyncMode};
use tributary_fetch::FetchContext;
use tributary_store::{
    CheckpointStorage, CredentialRotator, JobHistory, JsonCheckpointStorage, JsonLedgerStorage,
    MemoryContentStore, PooledCredential,
};
use tributary_sync::{SyncOrchestrator, SyncOutcome, SyncSettings};

use common::{ScriptedAdapter, fast_retry, start_time};

/// A fresh engine over the state directory, as after a process restart.
fn engine(
    dir: &Path,
    clock: Arc<FixedClock>,
    store: Arc<MemoryContentStore>,
) -> (SyncOrchestrator, Arc<ScriptedAdapter>) {
    let adapter = Arc::new(ScriptedAdapter::paged(ProviderKind::YouTube, 4, 1).with_units(50));
    let rotator = CredentialRotator::new(
        Arc::new(JsonLedgerStorage::new(dir.join("ledger"))),
        clock.clone(),
    )
    .with_pools([(
        ProviderKind::YouTube,
        vec![PooledCredential::new("primary", "token", 100)],
    )]);

    let orchestrator = SyncOrchestrator::builder()
        .context(Arc::new(FetchContext::builder().retry(fast_retry()).build()))
        .rotator(Arc::new(rotator))
        .checkpoints(Arc::new(JsonCheckpointStorage::new(dir.join("checkpoints.json"))))
        .store(store)
        .history(Arc::new(JobHistory::in_memory()))
        .clock(clock)
        .settings(SyncSettings::default().with_retry(fast_retry()))
        .adapter(adapter.clone())
        .build()
        .unwrap();
    (orchestrator, adapter)
}

fn completed(outcome: SyncOutcome) -> tributary_core::SyncJob {
    match outcome {
        SyncOutcome::Completed(job) => job,
        other => panic!("expected a completed job, got {other:?}"),
    }
}

#[tokio::test]
async fn test_progress_and_quota_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::new(start_time()));
    let store = Arc::new(MemoryContentStore::new());

    let (first, _) = engine(dir.path(), clock.clone(), store.clone());
    let job = completed(
        first
            .run_sync(ProviderKind::YouTube, SyncMode::Incremental)
            .await
            .unwrap(),
    );
    assert_eq!(job.reason, Some(FailureReason::QuotaExhausted));
    assert_eq!(job.pages, 2);
    drop(first);

    // Same day: the persisted ledger still has the credential blocked.
    let (second, adapter) = engine(dir.path(), clock.clone(), store.clone());
    let usage = second.get_quota_status(ProviderKind::YouTube).await.unwrap();
    assert_eq!(usage[0].used_today, 100);
    assert!(usage[0].blocked);
    let job = completed(
        second
            .run_sync(ProviderKind::YouTube, SyncMode::Incremental)
            .await
            .unwrap(),
    );
    assert_eq!(job.reason, Some(FailureReason::QuotaExhausted));
    assert_eq!(adapter.calls(), 0);
    drop(second);

    // Next day: the counter resets and the run resumes from the saved cursor.
    clock.advance(chrono::Duration::days(1));
    let (third, adapter) = engine(dir.path(), clock.clone(), store.clone());
    let job = completed(
        third
            .run_sync(ProviderKind::YouTube, SyncMode::Incremental)
            .await
            .unwrap(),
    );
    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.checkpoint_before.as_deref(), Some("2"));
    assert_eq!(job.pages, 2);
    assert_eq!(adapter.calls(), 2);
    assert_eq!(store.len().await, 4);

    let cp = JsonCheckpointStorage::new(dir.path().join("checkpoints.json"))
        .load(ProviderKind::YouTube)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cp.cursor.as_deref(), Some("4"));
    assert!(dir.path().join("ledger").is_dir());
}
