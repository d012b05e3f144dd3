// Life of a request:
// 1. HTTP or WebSocket request comes in
// 2. Chaos middleware may replace it with a synthetic 500 (opt-in via ?chaos=1)
// 3. For queries:
//     - Lock the store
//     - Read from the generated dataset
//     - Respond as JSON
//    For WebSocket subscriptions:
//     - Send the run's current status
//     - Stream simulated log/metric/timeline events until close
//
// System components:
//  - Seeded PRNG (string seed -> reproducible draw sequence)
//  - Dataset generator (experiments, runs, registry, deployments, traces)
//  - In-memory query store
//  - Live event simulator
//  - Reconnecting stream client

pub mod api;
pub mod chaos;
pub mod client;
pub mod config;
pub mod generator;
pub mod live;
pub mod rng;
pub mod store;
pub mod time;
pub mod types;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod testing;

pub use api::AppState;
pub use store::QueryStore;
