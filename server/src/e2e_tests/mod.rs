//! End-to-end tests at the store/stream level.
//!
//! Each test file covers a specific scenario, using fixed seeds and a
//! simulated clock to verify the complete query/streaming cycle.

#![cfg(test)]

mod test_authoring_run;
mod test_chaos_injection;
mod test_dataset_determinism;
mod test_deployment_lifecycle;
mod test_incident_correlation;
mod test_log_pagination;
mod test_ordering;
mod test_stream_reconnect;
