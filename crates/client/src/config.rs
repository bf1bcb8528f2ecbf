//! Client configuration
//!
//! Defaults, then an optional TOML file, then environment overrides. The
//! CLI layers its own flags on top.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "JOBTRACK_API_URL";
const DEFAULT_REASONING_CONTEXT: &str = "You are an AI assistant helping with job search questions.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP(S) base URL of the backend; WebSocket URLs are derived from it.
    pub api_base_url: String,
    pub onboarding_path: String,
    pub reasoning_path: String,
    pub reasoning_connect_timeout_ms: u64,
    /// Unset means the onboarding handshake is not bounded.
    pub onboarding_connect_timeout_ms: Option<u64>,
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub reasoning_context: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            onboarding_path: "/api/ost/ws/onboarding".to_string(),
            reasoning_path: "/reasoning/ws/reasoning".to_string(),
            reasoning_connect_timeout_ms: 10_000,
            onboarding_connect_timeout_ms: None,
            reconnect_base_delay_ms: 2_000,
            max_reconnect_attempts: 3,
            reasoning_context: DEFAULT_REASONING_CONTEXT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ClientError> {
        toml::from_str(raw).map_err(|e| ClientError::InvalidConfig(e.to_string()))
    }

    /// Apply `JOBTRACK_API_URL` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = std::env::var(API_URL_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            self.api_base_url = url;
        }
        self
    }

    /// WebSocket base: the API base with its `http` prefix swapped for `ws`.
    pub fn ws_base_url(&self) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        match base.strip_prefix("http") {
            Some(rest) => format!("ws{rest}"),
            None => base.to_string(),
        }
    }

    pub fn onboarding_url(&self, session_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.ws_base_url(),
            self.onboarding_path.trim_matches('/'),
            session_id
        )
    }

    pub fn reasoning_url(&self) -> String {
        format!(
            "{}/{}",
            self.ws_base_url(),
            self.reasoning_path.trim_matches('/')
        )
    }

    pub fn reasoning_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.reasoning_connect_timeout_ms)
    }

    pub fn onboarding_connect_timeout(&self) -> Option<Duration> {
        self.onboarding_connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_websocket_urls_from_http_base() {
        let config = ClientConfig {
            api_base_url: "https://jobs.example.com/".to_string(),
            ..Default::default()
        };

        assert_eq!(config.ws_base_url(), "wss://jobs.example.com");
        assert_eq!(
            config.onboarding_url("abc"),
            "wss://jobs.example.com/api/ost/ws/onboarding/abc"
        );
        assert_eq!(
            config.reasoning_url(),
            "wss://jobs.example.com/reasoning/ws/reasoning"
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml(
            r#"
api_base_url = "http://10.0.0.5:9000"
max_reconnect_attempts = 5
"#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://10.0.0.5:9000");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_base_delay_ms, 2_000);
        assert_eq!(config.reasoning_connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.onboarding_connect_timeout(), None);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ClientConfig::from_toml("max_reconnect_attempts = \"lots\"").unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config =
            ClientConfig::load(Path::new("/nonexistent/jobtrack/config.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }
}
