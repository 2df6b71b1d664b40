pub mod cli;
pub mod config;
pub mod convergence;
pub mod coordinator;
pub mod display;
pub mod heartbeat;
pub mod invoker;
pub mod oracle;
pub mod panel;
pub mod rpc;
pub mod server;
pub mod state;

#[cfg(test)]
mod testing;

/// Initialize tracing with a default filter if `RUST_LOG` is unset.
pub fn init_tracing() {
    let default_filter = "svcpanel=info,axum=warn,tower=warn";
    let filter_layer = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(filter_layer)
        .with_target(false)
        .compact()
        .init();
}
