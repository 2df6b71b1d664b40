use std::sync::Arc;

use serde_json::Value;

use crate::rpc::StatusSource;
use crate::state::ServiceState;

/// Normalizes whatever the status source reports into a [`ServiceState`].
///
/// Never fails: transport errors and malformed payloads read as `NotRunning`,
/// so an unreachable service is never shown as running.
#[derive(Clone)]
pub struct StatusOracle {
    source: Arc<dyn StatusSource>,
    service: String,
    instance: String,
}

impl StatusOracle {
    pub fn new(
        source: Arc<dyn StatusSource>,
        service: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            source,
            service: service.into(),
            instance: instance.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub async fn query_state(&self) -> ServiceState {
        match self.source.query_service_status(&self.service).await {
            Ok(payload) => {
                ServiceState::from_running(instance_running(&payload, &self.service, &self.instance))
            }
            Err(err) => {
                tracing::debug!(service = %self.service, %err, "status query failed; treating as not running");
                ServiceState::NotRunning
            }
        }
    }
}

/// `payload[service].instances[instance].running`, counted only when it is literally `true`.
pub fn instance_running(payload: &Value, service: &str, instance: &str) -> bool {
    payload
        .get(service)
        .and_then(|svc| svc.get("instances"))
        .and_then(|instances| instances.get(instance))
        .and_then(|inst| inst.get("running"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
