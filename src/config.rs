use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use shellexpand::tilde;
use url::Url;

use crate::convergence::ConvergencePolicy;
use crate::heartbeat::MAX_PERIOD;
use crate::rpc::ANONYMOUS_SESSION;

/// Top-level panel configuration: which service to manage and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    /// Init script / procd service name.
    #[serde(default = "default_service")]
    pub service: String,
    /// procd instance whose `running` flag is authoritative.
    #[serde(default = "default_instance")]
    pub instance: String,
    #[serde(default)]
    pub ubus: UbusConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default, alias = "webui", alias = "web-ui")]
    pub web_ui: WebUiConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            instance: default_instance(),
            ubus: UbusConfig::default(),
            poll: PollConfig::default(),
            web_ui: WebUiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UbusConfig {
    /// JSON-RPC endpoint, e.g. `http://192.168.1.1/ubus`.
    #[serde(default = "default_ubus_url", alias = "endpoint")]
    pub url: String,
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UbusConfig {
    fn default() -> Self {
        Self {
            url: default_ubus_url(),
            session: default_session(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl UbusConfig {
    pub fn endpoint(&self) -> Result<Url> {
        let expanded = shellexpand::env(&self.url)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| self.url.clone());
        Url::parse(&expanded).with_context(|| format!("invalid ubus url '{}'", self.url))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_convergence_interval_ms")]
    pub convergence_interval_ms: u64,
    #[serde(default = "default_convergence_max_attempts")]
    pub convergence_max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            convergence_interval_ms: default_convergence_interval_ms(),
            convergence_max_attempts: default_convergence_max_attempts(),
        }
    }
}

impl PollConfig {
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs).clamp(Duration::from_secs(1), MAX_PERIOD)
    }

    pub fn convergence_policy(&self) -> ConvergencePolicy {
        ConvergencePolicy::new(
            Duration::from_millis(self.convergence_interval_ms),
            self.convergence_max_attempts,
        )
    }
}

/// Where the managed service serves its own web interface.
#[derive(Debug, Clone, Deserialize)]
pub struct WebUiConfig {
    #[serde(default = "default_web_ui_port")]
    pub port: u16,
    /// Defaults to the ubus endpoint's host.
    #[serde(default)]
    pub host: Option<String>,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            port: default_web_ui_port(),
            host: None,
        }
    }
}

impl PanelConfig {
    /// `http://<host>:<port>/` of the managed service's own UI.
    pub fn web_ui_url(&self) -> Result<Url> {
        let host = match &self.web_ui.host {
            Some(host) => host.clone(),
            None => {
                let endpoint = self.ubus.endpoint()?;
                endpoint
                    .host_str()
                    .map(str::to_string)
                    .with_context(|| format!("ubus url '{}' has no host", endpoint))?
            }
        };
        let raw = format!("http://{}:{}/", host, self.web_ui.port);
        Url::parse(&raw).with_context(|| format!("invalid web ui url '{}'", raw))
    }

    fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            bail!("service name must not be empty");
        }
        if self.instance.trim().is_empty() {
            bail!("instance name must not be empty");
        }
        self.ubus.endpoint()?;
        if self.poll.heartbeat_secs > MAX_PERIOD.as_secs() {
            bail!(
                "poll.heartbeat_secs must be at most {} (got {})",
                MAX_PERIOD.as_secs(),
                self.poll.heartbeat_secs
            );
        }
        Ok(())
    }
}

fn default_service() -> String {
    "torrserver".to_string()
}

fn default_instance() -> String {
    "instance1".to_string()
}

fn default_ubus_url() -> String {
    "http://192.168.1.1/ubus".to_string()
}

fn default_session() -> String {
    ANONYMOUS_SESSION.to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_heartbeat_secs() -> u64 {
    5
}

fn default_convergence_interval_ms() -> u64 {
    500
}

fn default_convergence_max_attempts() -> u32 {
    10
}

fn default_web_ui_port() -> u16 {
    8090
}

/// Returns ~/.config/svcpanel/config.toml
pub fn default_config_path() -> PathBuf {
    global_config_dir().join("config.toml")
}

pub fn global_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| expand_path("~/.config"))
        .join("svcpanel")
}

pub fn expand_path(raw: &str) -> PathBuf {
    let tilde_expanded = tilde(raw).into_owned();
    let env_expanded = match shellexpand::env(&tilde_expanded) {
        Ok(val) => val.into_owned(),
        Err(_) => tilde_expanded,
    };
    PathBuf::from(env_expanded)
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<PanelConfig> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: PanelConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

pub fn load_or_default<P: AsRef<Path>>(path: P) -> PanelConfig {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no panel config; using defaults");
        return PanelConfig::default();
    }
    match load(path) {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!(?err, "failed to load panel config; starting with defaults");
            PanelConfig::default()
        }
    }
}
