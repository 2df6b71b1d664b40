use std::sync::Arc;

use crate::rpc::{ActionSink, RpcError};
use crate::state::LifecycleAction;

/// Delivers lifecycle actions for one service. No retries; failures go to the caller.
#[derive(Clone)]
pub struct ActionInvoker {
    sink: Arc<dyn ActionSink>,
    service: String,
}

impl ActionInvoker {
    pub fn new(sink: Arc<dyn ActionSink>, service: impl Into<String>) -> Self {
        Self {
            sink,
            service: service.into(),
        }
    }

    pub async fn invoke(&self, action: LifecycleAction) -> Result<(), RpcError> {
        tracing::debug!(service = %self.service, %action, "invoking lifecycle action");
        self.sink
            .invoke_lifecycle_action(&self.service, action)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SERVICE, ScriptedSink};

    #[tokio::test]
    async fn issues_action_exactly_once() {
        let sink = ScriptedSink::accepting();
        let invoker = ActionInvoker::new(sink.clone(), SERVICE);

        invoker.invoke(LifecycleAction::Restart).await.unwrap();

        assert_eq!(sink.calls(), vec![LifecycleAction::Restart]);
    }

    #[tokio::test]
    async fn failure_is_surfaced_without_retry() {
        let sink = ScriptedSink::failing();
        let invoker = ActionInvoker::new(sink.clone(), SERVICE);

        let err = invoker.invoke(LifecycleAction::Stop).await.unwrap_err();

        assert!(matches!(err, RpcError::Rejected { .. }));
        assert_eq!(sink.calls().len(), 1);
    }
}
