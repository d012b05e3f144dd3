//! The same seed and clock must reproduce the dataset exactly.

use crate::testing::{all_run_ids, fixed_store};

#[test]
fn test_identical_seeds_reproduce_every_surface() {
    let a = fixed_store("prop-determinism");
    let b = fixed_store("prop-determinism");

    assert_eq!(a.list_experiments(), b.list_experiments());
    assert_eq!(a.list_models(), b.list_models());
    assert_eq!(a.list_deployments(), b.list_deployments());
    assert_eq!(a.list_templates(), b.list_templates());

    let run_ids = all_run_ids(&a);
    assert_eq!(run_ids, all_run_ids(&b));
    for id in &run_ids {
        assert_eq!(a.get_run(id).unwrap(), b.get_run(id).unwrap());
        assert_eq!(
            a.run_logs(id, None, 1000).unwrap(),
            b.run_logs(id, None, 1000).unwrap()
        );
        for name in ["loss", "accuracy", "throughput", "gpu_util"] {
            assert_eq!(
                a.run_metrics(id, name, None, None).unwrap(),
                b.run_metrics(id, name, None, None).unwrap()
            );
        }
    }

    for model in a.list_models() {
        assert_eq!(
            a.list_model_versions(&model.id).unwrap(),
            b.list_model_versions(&model.id).unwrap()
        );
    }
}

#[test]
fn test_different_seeds_diverge() {
    let a = fixed_store("prop-determinism");
    let b = fixed_store("prop-determinism-2");
    assert_ne!(all_run_ids(&a), all_run_ids(&b));
}
