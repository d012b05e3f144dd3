use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::store::QueryStore;
use crate::time::SimulatedTimeSource;

/// Fixed generation instant shared by deterministic tests.
#[allow(clippy::unwrap_used)]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A store generated at [`fixed_now`] for the given seed.
#[allow(clippy::unwrap_used)]
pub fn fixed_store(seed: &str) -> QueryStore {
    let time = Arc::new(SimulatedTimeSource::at(fixed_now()));
    QueryStore::new(seed, time).unwrap()
}

/// Every run id in the store, in listing order.
#[allow(clippy::unwrap_used)]
pub fn all_run_ids(store: &QueryStore) -> Vec<String> {
    store
        .list_experiments()
        .iter()
        .flat_map(|e| store.list_runs(&e.id).unwrap())
        .map(|r| r.id)
        .collect()
}
