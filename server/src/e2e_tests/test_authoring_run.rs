//! Authoring flow: config text in, fully hydrated run out.

use crate::generator::QUICK_EXPERIMENT_ID;
use crate::testing::{all_run_ids, fixed_store};
use crate::types::{AuthoringConfig, RunStatus, TimelineEventType};

#[test]
fn test_every_run_starts_with_a_commit_event() {
    let store = fixed_store("t1");
    for run_id in all_run_ids(&store) {
        let run = store.get_run(&run_id).unwrap();
        let commits: Vec<_> = run
            .timeline
            .iter()
            .filter(|e| e.event_type == TimelineEventType::Commit)
            .collect();
        assert_eq!(commits.len(), 1, "run {run_id}");
        assert_eq!(commits[0].ts, run.run.started_at);
    }
}

#[test]
fn test_created_run_is_live_and_resolvable() {
    let mut store = fixed_store("t1");

    // reuse an existing config document as the submitted text
    let existing_run_id = all_run_ids(&store).remove(0);
    let existing = store.get_run(&existing_run_id).unwrap();
    let source = store
        .get_config_version(&existing.run.config_version_id)
        .unwrap();
    let parsed = AuthoringConfig::from_text(source.language, &source.content).unwrap();

    let created = store
        .create_run_from_config(None, source.language, source.content.clone(), &parsed)
        .unwrap();

    assert_eq!(created.run.status, RunStatus::Running);
    assert!(created.run.ended_at.is_none());
    assert_eq!(created.experiment.id, QUICK_EXPERIMENT_ID);

    // the new run leads its experiment's listing
    let runs = store.list_runs(QUICK_EXPERIMENT_ID).unwrap();
    assert_eq!(runs.first().map(|r| r.id.clone()), Some(created.run.id.clone()));

    // its config version round-trips through the store
    let version = store.get_config_version(&created.run.config_version_id).unwrap();
    assert_eq!(version.content, source.content);
    assert_eq!(version.language, source.language);
    assert_eq!(version.id, created.config_version.id);

    // and it carries a full synthetic history
    let fetched = store.get_run(&created.run.id).unwrap();
    assert!(!fetched.timeline.is_empty());
    assert!(!store.run_logs(&created.run.id, None, 100).unwrap().items.is_empty());
    assert!(!store
        .run_metrics(&created.run.id, "loss", None, None)
        .unwrap()
        .is_empty());
}
