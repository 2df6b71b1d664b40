//! Runs one lifecycle action at a time: lock the controls, invoke, wait for
//! convergence, then unlock with the observed state.

use serde::Serialize;

use crate::convergence::{ConvergencePolicy, await_convergence};
use crate::display::{Display, DisplayUpdate};
use crate::invoker::ActionInvoker;
use crate::oracle::StatusOracle;
use crate::state::{LifecycleAction, ServiceState};

/// Result of one call to [`Coordinator::trigger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle held the control lock; nothing was sent.
    Rejected { action: LifecycleAction },
    /// The action was delivered and polling ended with `state`.
    Completed {
        action: LifecycleAction,
        state: ServiceState,
    },
    /// The action could not be delivered; `state` is the resynchronized reading.
    Recovered {
        action: LifecycleAction,
        state: ServiceState,
        error: String,
    },
}

impl CycleOutcome {
    pub fn action(&self) -> LifecycleAction {
        match self {
            CycleOutcome::Rejected { action }
            | CycleOutcome::Completed { action, .. }
            | CycleOutcome::Recovered { action, .. } => *action,
        }
    }

    pub fn state(&self) -> Option<ServiceState> {
        match self {
            CycleOutcome::Rejected { .. } => None,
            CycleOutcome::Completed { state, .. } | CycleOutcome::Recovered { state, .. } => {
                Some(*state)
            }
        }
    }

    /// Delivered and the service reached the action's expected state.
    pub fn converged(&self) -> bool {
        matches!(self, CycleOutcome::Completed { action, state } if *state == action.expected_state())
    }
}

/// Holds the control lock for one cycle; releases it even if the cycle future is dropped.
struct ControlLock<'a> {
    display: &'a Display,
    released: bool,
}

impl<'a> ControlLock<'a> {
    fn acquire(display: &'a Display, action: LifecycleAction) -> Option<Self> {
        if display.apply(DisplayUpdate::Begin(action)) {
            Some(Self {
                display,
                released: false,
            })
        } else {
            None
        }
    }

    fn release(mut self, state: ServiceState, error: Option<String>) {
        self.released = true;
        self.display.apply(DisplayUpdate::Finish { state, error });
    }
}

impl Drop for ControlLock<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let state = self.display.state();
        tracing::warn!("convergence cycle dropped before completion; releasing controls");
        self.display.apply(DisplayUpdate::Finish {
            state,
            error: Some("cycle interrupted".to_string()),
        });
    }
}

pub struct Coordinator {
    oracle: StatusOracle,
    invoker: ActionInvoker,
    policy: ConvergencePolicy,
    display: Display,
}

impl Coordinator {
    pub fn new(
        oracle: StatusOracle,
        invoker: ActionInvoker,
        policy: ConvergencePolicy,
        display: Display,
    ) -> Self {
        Self {
            oracle,
            invoker,
            policy,
            display,
        }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn oracle(&self) -> &StatusOracle {
        &self.oracle
    }

    pub fn policy(&self) -> ConvergencePolicy {
        self.policy
    }

    /// Run one convergence cycle for `action`, or reject it if one is already running.
    ///
    /// Whatever happens, the controls end unlocked, relabelled, and enabled
    /// according to the last observed state.
    pub async fn trigger(&self, action: LifecycleAction) -> CycleOutcome {
        let Some(lock) = ControlLock::acquire(&self.display, action) else {
            tracing::debug!(%action, "control lock held; ignoring action");
            return CycleOutcome::Rejected { action };
        };

        let (state, error) = match self.invoker.invoke(action).await {
            Ok(()) => {
                let expected = action.expected_state();
                let state = await_convergence(&self.oracle, expected, self.policy).await;
                (state, None)
            }
            Err(err) => {
                tracing::warn!(service = self.oracle.service(), %action, %err, "lifecycle action failed; resynchronizing");
                (self.oracle.query_state().await, Some(err.to_string()))
            }
        };

        lock.release(state, error.clone());

        let outcome = match error {
            None => CycleOutcome::Completed { action, state },
            Some(error) => CycleOutcome::Recovered {
                action,
                state,
                error,
            },
        };
        tracing::info!(
            service = self.oracle.service(),
            %action,
            converged = outcome.converged(),
            %state,
            "cycle finished"
        );
        outcome
    }

    /// Query once and push the reading to the display (ignored mid-cycle).
    pub async fn refresh(&self) -> ServiceState {
        let cycle = self.display.cycle();
        let state = self.oracle.query_state().await;
        self.display.apply(DisplayUpdate::Observed { state, cycle });
        state
    }
}
