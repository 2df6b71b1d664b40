//! Scripted in-memory status source and action sink for engine tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::rpc::{ActionSink, RpcError, StatusSource};
use crate::state::LifecycleAction;

pub const SERVICE: &str = "torrserver";
pub const INSTANCE: &str = "instance1";

pub fn status_payload(running: bool) -> Value {
    json!({ SERVICE: { "instances": { INSTANCE: { "running": running, "pid": 4242 } } } })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Running,
    Stopped,
    Malformed,
    Fail,
}

/// Answers status queries from a script; the last reply repeats once the script runs out.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Reply>,
    queries: AtomicUsize,
    times: Mutex<Vec<Instant>>,
    latency: Mutex<Duration>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(Reply::Stopped),
            queries: AtomicUsize::new(0),
            times: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
        })
    }

    /// Replace the remaining script; used to flip the service out-of-band.
    pub fn set(&self, reply: Reply) {
        self.script.lock().unwrap().clear();
        *self.last.lock().unwrap() = reply;
    }

    /// Delay applied to queries issued from now on. The reply is picked when
    /// the query goes out, so a slow answer describes the service as it was then.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn query_times(&self) -> Vec<Instant> {
        self.times.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = script.pop_front() {
            *last = reply;
        }
        *last
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn query_service_status(&self, _service: &str) -> Result<Value, RpcError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.times.lock().unwrap().push(Instant::now());
        let reply = self.next_reply();
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match reply {
            Reply::Running => Ok(status_payload(true)),
            Reply::Stopped => Ok(status_payload(false)),
            Reply::Malformed => Ok(json!({ SERVICE: { "instances": [] } })),
            Reply::Fail => Err(RpcError::Protocol("scripted failure".into())),
        }
    }
}

/// Records lifecycle actions; either acknowledges or rejects all of them.
pub struct ScriptedSink {
    accept: bool,
    calls: Mutex<Vec<LifecycleAction>>,
}

impl ScriptedSink {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            accept: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<LifecycleAction> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionSink for ScriptedSink {
    async fn invoke_lifecycle_action(
        &self,
        _service: &str,
        action: LifecycleAction,
    ) -> Result<(), RpcError> {
        self.calls.lock().unwrap().push(action);
        // Behave like a real round trip: give other tasks a turn before answering.
        tokio::task::yield_now().await;
        if self.accept {
            Ok(())
        } else {
            Err(RpcError::Rejected { action })
        }
    }
}
