//! ---
//! fl_section: "03-persistence-logging"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Persistence abstractions for the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use faultline_common::FailureCategory;
use faultline_history::{
    FailureRecord, HealingAttempt, HealingOutcome, HealingStrategy, HistorySnapshot,
    HistoryStore, ManifestChange,
};
use tempfile::tempdir;
use uuid::Uuid;

fn failure(episode: Uuid, attempt: u32) -> FailureRecord {
    FailureRecord {
        id: Uuid::new_v4(),
        episode_id: episode,
        category: FailureCategory::Dependency,
        message: "ModuleNotFoundError: No module named 'yaml'".into(),
        timestamp: Utc::now(),
        source_command: "python app.py".into(),
        attempt_number: attempt,
    }
}

#[test]
fn concurrent_writers_never_interleave_records() {
    let dir = tempdir().unwrap();
    let store = Arc::new(HistoryStore::open(dir.path().join("history.jsonl")).unwrap());
    let episode = Uuid::new_v4();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                for attempt in 0..25 {
                    store.append(failure(episode, worker * 100 + attempt)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.failures.len(), 100);
}

#[test]
fn import_skips_records_already_present() {
    let dir = tempdir().unwrap();
    let store = HistoryStore::open(dir.path().join("history.jsonl")).unwrap();
    let episode = Uuid::new_v4();
    let existing = failure(episode, 1);
    store.append(existing.clone()).unwrap();

    let export = HistorySnapshot {
        failures: vec![existing, failure(episode, 2)],
        healing_attempts: vec![HealingAttempt {
            id: Uuid::new_v4(),
            episode_id: episode,
            failure_category: FailureCategory::Dependency,
            strategy: HealingStrategy::InstallDependencies,
            attempt_number: 1,
            outcome: HealingOutcome::Healed,
            duration_seconds: 3.5,
            started_at: Utc::now(),
            detail: Some("installed PyYAML>=6.0".into()),
        }],
        manifest_changes: vec![ManifestChange {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            manifest: "requirements.txt".into(),
            module: "yaml".into(),
            package: "PyYAML".into(),
            requirement: "PyYAML>=6.0".into(),
            installed: Some(true),
        }],
        ..Default::default()
    };
    let export_path = dir.path().join("export.json");
    std::fs::write(&export_path, serde_json::to_string(&export).unwrap()).unwrap();

    let first = store.import(&export_path).unwrap();
    assert_eq!((first.imported, first.skipped), (3, 1));
    let second = store.import(&export_path).unwrap();
    assert_eq!((second.imported, second.skipped), (0, 4));

    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.failures.len(), 2);
    assert_eq!(snapshot.healing_attempts.len(), 1);
    assert_eq!(snapshot.manifest_changes.len(), 1);
}
