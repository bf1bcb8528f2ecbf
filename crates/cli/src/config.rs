//! Effective client configuration for one CLI run.
//!
//! Defaults, then `~/.jobtrack/config.toml` (or `--config`), then
//! `JOBTRACK_API_URL`, then `--server`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use jobtrack_client::ClientConfig;

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".jobtrack").join("config.toml"))
}

pub fn load(config_path: Option<&Path>, server: Option<&str>) -> anyhow::Result<ClientConfig> {
    let config = match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            read(path)?
        }
        None => match default_config_path() {
            Some(path) => read(&path)?,
            None => ClientConfig::default(),
        },
    };
    Ok(apply_server_flag(config.with_env_overrides(), server))
}

fn read(path: &Path) -> anyhow::Result<ClientConfig> {
    ClientConfig::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

fn apply_server_flag(mut config: ClientConfig, server: Option<&str>) -> ClientConfig {
    if let Some(server) = server.map(str::trim).filter(|s| !s.is_empty()) {
        config.api_base_url = server.to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_flag_wins() {
        let config = ClientConfig::from_toml("api_base_url = \"http://file:9000\"").unwrap();
        let config = apply_server_flag(config, Some("https://flag.example.com"));
        assert_eq!(config.api_base_url, "https://flag.example.com");
        assert_eq!(config.ws_base_url(), "wss://flag.example.com");
    }

    #[test]
    fn blank_server_flag_is_ignored() {
        let config = apply_server_flag(ClientConfig::default(), Some("  "));
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = load(Some(Path::new("/definitely/not/here.toml")), None).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn effective_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&ClientConfig::default()).unwrap();
        assert!(rendered.contains("reconnect_base_delay_ms = 2000"));
        assert_eq!(ClientConfig::from_toml(&rendered).unwrap(), ClientConfig::default());
    }
}
