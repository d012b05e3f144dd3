//! Deployment actions: stage advancement, incident injection, rollback.

use crate::store::QueryStore;
use crate::testing::fixed_store;
use crate::types::{DeploymentStage, DeploymentStatus, RolloutStepStatus};

fn store_with_stage(stage: DeploymentStage) -> (QueryStore, String) {
    // stage assignment is seed dependent, so scan a few seeds; generation
    // pre-sets ended_at on a quarter of deployments, skip those
    for i in 0..20 {
        let store = fixed_store(&format!("lifecycle-{i}"));
        if let Some(d) = store.list_deployments().into_iter().find(|d| {
            d.stage == stage && d.status != DeploymentStatus::RolledBack && d.ended_at.is_none()
        }) {
            return (store, d.id);
        }
    }
    panic!("no seed produced a live deployment in stage {stage:?}");
}

#[test]
fn test_advance_walks_canary_to_succeeded() {
    let (mut store, id) = store_with_stage(DeploymentStage::Canary);

    let ramp = store.advance_deployment(&id).unwrap();
    assert_eq!(ramp.stage, DeploymentStage::Ramp);
    assert_eq!(ramp.status, DeploymentStatus::Running);
    assert_eq!(
        ramp.rollout_steps.iter().map(|s| s.status).collect::<Vec<_>>(),
        vec![
            RolloutStepStatus::Done,
            RolloutStepStatus::Active,
            RolloutStepStatus::Pending
        ]
    );

    let prod = store.advance_deployment(&id).unwrap();
    assert_eq!(prod.stage, DeploymentStage::Prod);
    assert!(prod.ended_at.is_none());

    let done = store.advance_deployment(&id).unwrap();
    assert_eq!(done.stage, DeploymentStage::Prod);
    assert_eq!(done.status, DeploymentStatus::Succeeded);
    assert!(done.ended_at.is_some());
    assert!(
        done.rollout_steps
            .iter()
            .all(|s| s.status == RolloutStepStatus::Done)
    );
}

#[test]
fn test_incident_lands_newest_first_and_pauses() {
    let (mut store, id) = store_with_stage(DeploymentStage::Canary);
    let before = store.get_deployment(&id).unwrap().incidents.len();

    let first = store.simulate_incident(&id).unwrap();
    assert_eq!(first.incidents.len(), before + 1);
    assert_eq!(first.status, DeploymentStatus::Paused);

    let second = store.simulate_incident(&id).unwrap();
    assert_eq!(second.incidents.len(), before + 2);
    // newest incident sits at the front
    assert!(second.incidents[0].created_at >= second.incidents[1].created_at);
}

#[test]
fn test_rollback_is_terminal() {
    let (mut store, id) = store_with_stage(DeploymentStage::Ramp);

    let rolled = store.rollback_deployment(&id).unwrap();
    assert_eq!(rolled.status, DeploymentStatus::RolledBack);
    assert!(rolled.ended_at.is_some());
    assert_eq!(
        rolled.rollout_steps.last().unwrap().status,
        RolloutStepStatus::Failed
    );

    // advancing a rolled back deployment is a no-op
    let after = store.advance_deployment(&id).unwrap();
    assert_eq!(after, rolled);
}
