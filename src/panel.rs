//! One open control panel: the service's displayed state, its heartbeat, and
//! the three action entry points presentation layers bind to.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::watch;
use url::Url;

use crate::config::PanelConfig;
use crate::convergence::ConvergencePolicy;
use crate::coordinator::{Coordinator, CycleOutcome};
use crate::display::{Display, PanelSnapshot};
use crate::heartbeat::Heartbeat;
use crate::invoker::ActionInvoker;
use crate::oracle::StatusOracle;
use crate::rpc::{ActionSink, StatusSource, UbusClient};
use crate::state::{LifecycleAction, ServiceState};

#[derive(Debug, Clone)]
pub struct PanelSettings {
    pub service: String,
    pub instance: String,
    pub policy: ConvergencePolicy,
    pub heartbeat: Duration,
    pub web_ui: Option<Url>,
}

impl PanelSettings {
    pub fn from_config(cfg: &PanelConfig) -> Self {
        let web_ui = match cfg.web_ui_url() {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(?err, "cannot derive web ui url");
                None
            }
        };
        Self {
            service: cfg.service.clone(),
            instance: cfg.instance.clone(),
            policy: cfg.poll.convergence_policy(),
            heartbeat: cfg.poll.heartbeat_period(),
            web_ui,
        }
    }
}

pub struct Panel {
    coordinator: Arc<Coordinator>,
    heartbeat: Heartbeat,
    web_ui: Option<Url>,
}

impl Panel {
    /// Connect to the configured ubus endpoint and open a panel on it.
    pub async fn open(cfg: &PanelConfig) -> Result<Self> {
        let client = Arc::new(UbusClient::from_config(cfg)?);
        tracing::debug!(endpoint = %client.endpoint(), service = %cfg.service, "opening panel");
        Ok(Self::with_backends(client.clone(), client, PanelSettings::from_config(cfg)).await)
    }

    /// Takes an initial reading, then starts the heartbeat.
    pub async fn with_backends(
        status: Arc<dyn StatusSource>,
        sink: Arc<dyn ActionSink>,
        settings: PanelSettings,
    ) -> Self {
        let oracle = StatusOracle::new(status, settings.service.clone(), settings.instance);
        let initial = oracle.query_state().await;
        let display = Display::new(initial);
        tracing::info!(service = %settings.service, state = %initial, "panel opened");

        let heartbeat = Heartbeat::spawn(oracle.clone(), display.clone(), settings.heartbeat);
        let invoker = ActionInvoker::new(sink, settings.service);
        let coordinator = Arc::new(Coordinator::new(oracle, invoker, settings.policy, display));

        Self {
            coordinator,
            heartbeat,
            web_ui: settings.web_ui,
        }
    }

    pub fn service(&self) -> &str {
        self.coordinator.oracle().service()
    }

    pub fn state(&self) -> ServiceState {
        self.coordinator.display().state()
    }

    pub fn is_locked(&self) -> bool {
        self.coordinator.display().is_locked()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.coordinator.display().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelSnapshot> {
        self.coordinator.display().subscribe()
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    pub fn web_ui_url(&self) -> Option<&Url> {
        self.web_ui.as_ref()
    }

    pub async fn start(&self) -> CycleOutcome {
        self.trigger(LifecycleAction::Start).await
    }

    pub async fn stop(&self) -> CycleOutcome {
        self.trigger(LifecycleAction::Stop).await
    }

    pub async fn restart(&self) -> CycleOutcome {
        self.trigger(LifecycleAction::Restart).await
    }

    /// Run a cycle on its own task so an impatient caller cannot cut it short.
    pub async fn trigger(&self, action: LifecycleAction) -> CycleOutcome {
        let coordinator = Arc::clone(&self.coordinator);
        match tokio::spawn(async move { coordinator.trigger(action).await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(?err, %action, "cycle task failed");
                CycleOutcome::Recovered {
                    action,
                    state: self.state(),
                    error: format!("cycle task failed: {err}"),
                }
            }
        }
    }

    pub async fn refresh(&self) -> ServiceState {
        self.coordinator.refresh().await
    }
}
