//! Listing order is part of the contract: collections come back newest
//! first, series and logs oldest first.

use crate::testing::{all_run_ids, fixed_store};

#[test]
fn test_experiments_newest_first() {
    let store = fixed_store("prop-ordering");
    let experiments = store.list_experiments();
    for pair in experiments.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[test]
fn test_runs_newest_started_first() {
    let store = fixed_store("prop-ordering");
    for experiment in store.list_experiments() {
        let runs = store.list_runs(&experiment.id).unwrap();
        for pair in runs.windows(2) {
            assert!(pair[0].started_at >= pair[1].started_at);
        }
    }
}

#[test]
fn test_logs_metrics_and_timeline_ascend() {
    let store = fixed_store("prop-ordering");
    for run_id in all_run_ids(&store) {
        let logs = store.run_logs(&run_id, None, 1000).unwrap();
        for pair in logs.items.windows(2) {
            assert!(pair[0].ts <= pair[1].ts);
        }
        for name in ["loss", "accuracy", "throughput", "gpu_util"] {
            let series = store.run_metrics(&run_id, name, None, None).unwrap();
            assert!(!series.is_empty());
            for pair in series.windows(2) {
                assert!(pair[0].ts <= pair[1].ts);
            }
        }
        let timeline = store.get_run(&run_id).unwrap().timeline;
        for pair in timeline.windows(2) {
            assert!(pair[0].ts <= pair[1].ts);
        }
    }
}

#[test]
fn test_deployments_and_versions_newest_first() {
    let store = fixed_store("prop-ordering");
    let deployments = store.list_deployments();
    for pair in deployments.windows(2) {
        assert!(pair[0].started_at >= pair[1].started_at);
    }
    for model in store.list_models() {
        let versions = store.list_model_versions(&model.id).unwrap();
        for pair in versions.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }
}
