use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Running condition of the managed service as last reported by the status source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Running,
    NotRunning,
}

impl ServiceState {
    pub fn from_running(running: bool) -> Self {
        if running {
            ServiceState::Running
        } else {
            ServiceState::NotRunning
        }
    }

    pub fn is_running(self) -> bool {
        self == ServiceState::Running
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Running => f.write_str("Running"),
            ServiceState::NotRunning => f.write_str("Not running"),
        }
    }
}

/// Lifecycle verbs understood by the init-action sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    pub const ALL: [LifecycleAction; 3] = [
        LifecycleAction::Start,
        LifecycleAction::Stop,
        LifecycleAction::Restart,
    ];

    /// State the service should settle in once the action has been applied.
    ///
    /// Fixed per action; never derived from what the service is doing now.
    pub fn expected_state(self) -> ServiceState {
        match self {
            LifecycleAction::Start | LifecycleAction::Restart => ServiceState::Running,
            LifecycleAction::Stop => ServiceState::NotRunning,
        }
    }

    /// Name sent over the wire (`setInitAction`).
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        }
    }

    /// Idle label of the control bound to this action.
    pub fn label(self) -> &'static str {
        match self {
            LifecycleAction::Start => "Start",
            LifecycleAction::Stop => "Stop",
            LifecycleAction::Restart => "Restart",
        }
    }

    /// Whether the control for this action is usable while the service is in `state`.
    pub fn enabled_in(self, state: ServiceState) -> bool {
        match self {
            LifecycleAction::Start => !state.is_running(),
            LifecycleAction::Stop | LifecycleAction::Restart => state.is_running(),
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleAction {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(LifecycleAction::Start),
            "stop" => Ok(LifecycleAction::Stop),
            "restart" => Ok(LifecycleAction::Restart),
            other => bail!("unknown lifecycle action '{}'", other),
        }
    }
}
