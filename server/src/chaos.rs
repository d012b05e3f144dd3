//! Synthetic request failure injection.
//!
//! Chaos is opt-in per request; the policy only decides whether an opted-in
//! request should fail. Unlike the dataset generator, chaos draws come from
//! the thread-local rng: injected failures are meant to be unpredictable,
//! and test mode turns them off entirely.

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct ChaosPolicy {
    rate: f64,
    enabled: bool,
}

impl ChaosPolicy {
    /// Create a policy with the given failure rate. In test mode the policy
    /// never fails a request, regardless of rate or opt-in.
    #[must_use]
    pub const fn new(rate: f64, test_mode: bool) -> Self {
        Self {
            rate,
            enabled: !test_mode,
        }
    }

    /// Whether this request should be failed with a synthetic error.
    #[must_use]
    pub fn should_fail(&self, opted_in: bool) -> bool {
        if !opted_in || !self.enabled {
            return false;
        }
        rand::rng().random::<f64>() < self.rate
    }
}
