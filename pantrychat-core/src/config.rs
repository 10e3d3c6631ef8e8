use serde::{Deserialize, Serialize};
use std::{fmt::Display, fs, path::Path, str::FromStr};
use tracing::info;

use crate::error::{CoreResult, RelayError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerCfg {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for the browser front end.
    #[serde(default = "default_cors")]
    pub cors: bool,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: default_cors(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_cors() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UpstreamCfg {
    /// Base URL of the local generation server, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Longest wait for the next upstream chunk before the session gives up.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for UpstreamCfg {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama2".to_string()
}
fn default_idle_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PromptCfg {
    #[serde(default = "default_preamble")]
    pub preamble: String,
    /// Label in front of the joined context items, e.g. "User's pantry".
    #[serde(default = "default_context_label")]
    pub context_label: String,
}

impl Default for PromptCfg {
    fn default() -> Self {
        Self {
            preamble: default_preamble(),
            context_label: default_context_label(),
        }
    }
}

fn default_preamble() -> String {
    "You are a helpful cooking assistant.".to_string()
}
fn default_context_label() -> String {
    "User's pantry".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub upstream: UpstreamCfg,
    #[serde(default)]
    pub prompt: PromptCfg,
    #[serde(default)]
    pub http: HttpCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(RelayError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| RelayError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| RelayError::Other(e.into()))?
            }
            Some("toml") => toml::from_str::<Self>(s).map_err(|e| RelayError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| RelayError::Other(e.into()))
                .or_else(|_| toml::from_str::<Self>(s).map_err(|e| RelayError::Other(e.into())))?,
        };
        cfg.validate()
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> CoreResult<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay environment values onto this config. `lookup` returns the raw
    /// value of a variable, or `None` when unset.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OLLAMA_MODEL") {
            info!("OLLAMA_MODEL set, using model {model}");
            self.upstream.model = model;
        }
        if let Some(base) = lookup("OLLAMA_BASE_URL") {
            self.upstream.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(port) = parse_var(&lookup, "CHAT_PORT")? {
            self.server.port = port;
        }
        if let Some(ms) = parse_var(&lookup, "UPSTREAM_IDLE_TIMEOUT_MS")? {
            self.upstream.idle_timeout_ms = ms;
        }
        self.validate()
    }

    /// Reject values that would make every session fail on its first read.
    pub fn validate(self) -> CoreResult<Self> {
        if self.upstream.idle_timeout_ms == 0 {
            return Err(RelayError::Validation(
                "upstream idle timeout must be greater than zero".into(),
            ));
        }
        Ok(self)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> CoreResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RelayError::Validation(format!("invalid {key} value '{raw}': {e}"))),
    }
}
