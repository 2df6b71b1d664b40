//! Bounded wait for the service to reach the state an action should produce.

use std::time::Duration;

use tokio::time::sleep;

use crate::oracle::StatusOracle;
use crate::state::ServiceState;

/// How long to keep polling after an action before settling for what is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergencePolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl ConvergencePolicy {
    /// A budget of zero attempts still issues one query.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for ConvergencePolicy {
    /// 10 polls, 500ms apart.
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 10)
    }
}

/// Poll the oracle until it reports `expected` or the attempt budget runs out.
///
/// Returns the last observed state either way. Running out of attempts is not
/// an error; callers compare the result against `expected` when they care.
pub async fn await_convergence(
    oracle: &StatusOracle,
    expected: ServiceState,
    policy: ConvergencePolicy,
) -> ServiceState {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts: u32 = 0;

    loop {
        let observed = oracle.query_state().await;
        attempts += 1;

        if observed == expected {
            tracing::debug!(service = oracle.service(), attempts, state = %observed, "converged");
            return observed;
        }
        if attempts >= max_attempts {
            tracing::info!(
                service = oracle.service(),
                attempts,
                expected = %expected,
                state = %observed,
                "gave up waiting for convergence"
            );
            return observed;
        }

        sleep(policy.interval).await;
    }
}
