//! ubus JSON-RPC transport for the two remote calls the panel needs:
//! `service list` for status and `luci setInitAction` for lifecycle actions.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use url::Url;

use crate::config::PanelConfig;
use crate::state::LifecycleAction;

/// Session id ubus hands to unauthenticated callers.
pub const ANONYMOUS_SESSION: &str = "00000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint answered HTTP {0}")]
    Http(u16),
    #[error("malformed reply: {0}")]
    Protocol(String),
    #[error("json-rpc error {code}: {message}")]
    JsonRpc { code: i64, message: String },
    #[error("ubus call failed with status {0}")]
    Ubus(i64),
    #[error("{action} was rejected by the init-action handler")]
    Rejected { action: LifecycleAction },
}

/// Source of raw service status payloads.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch whatever the remote side reports for `service`. The shape is not trusted.
    async fn query_service_status(&self, service: &str) -> Result<Value, RpcError>;
}

/// Sink for lifecycle actions. One call issues the action exactly once.
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn invoke_lifecycle_action(
        &self,
        service: &str,
        action: LifecycleAction,
    ) -> Result<(), RpcError>;
}

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// HTTP client for a ubus JSON-RPC endpoint (usually `http://<router>/ubus`).
#[derive(Debug)]
pub struct UbusClient {
    http: Client,
    endpoint: Url,
    session: String,
    next_id: AtomicU64,
}

impl UbusClient {
    pub fn new(endpoint: Url, session: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| format!("failed to build http client with timeout {:?}", timeout))?;
        Ok(Self {
            http,
            endpoint,
            session: session.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(cfg: &PanelConfig) -> anyhow::Result<Self> {
        let endpoint = cfg.ubus.endpoint()?;
        Self::new(endpoint, cfg.ubus.session.clone(), cfg.ubus.timeout())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issue one `call` and return the data object of a successful reply (`{}` when absent).
    pub async fn call(&self, object: &str, method: &str, args: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "call",
            "params": [self.session, object, method, args],
        });

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Http(status.as_u16()));
        }

        let reply: RpcReply = resp.json().await?;
        if let Some(err) = reply.error {
            return Err(RpcError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }

        let mut result = reply
            .result
            .ok_or_else(|| RpcError::Protocol("reply carries neither result nor error".into()))?
            .into_iter();
        let code = result
            .next()
            .and_then(|v| v.as_i64())
            .ok_or_else(|| RpcError::Protocol("result is missing its status code".into()))?;
        if code != 0 {
            return Err(RpcError::Ubus(code));
        }

        Ok(result.next().unwrap_or_else(|| Value::Object(Map::new())))
    }
}

#[async_trait]
impl StatusSource for UbusClient {
    async fn query_service_status(&self, service: &str) -> Result<Value, RpcError> {
        self.call("service", "list", json!({ "name": service })).await
    }
}

#[async_trait]
impl ActionSink for UbusClient {
    async fn invoke_lifecycle_action(
        &self,
        service: &str,
        action: LifecycleAction,
    ) -> Result<(), RpcError> {
        let data = self
            .call(
                "luci",
                "setInitAction",
                json!({ "name": service, "action": action.as_str() }),
            )
            .await?;

        // Only an explicit `false` (init script exit status) is a refusal.
        if data.get("result").and_then(Value::as_bool) == Some(false) {
            Err(RpcError::Rejected { action })
        } else {
            Ok(())
        }
    }
}
