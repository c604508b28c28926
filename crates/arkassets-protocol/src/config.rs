//! Configuration for a pipeline run

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ProtocolError, Result};
use crate::retry::RetryPolicy;
use crate::server::{Server, ServerEndpoints};
use crate::transport::HttpConfig;

/// Default save directory
pub const DEFAULT_SAVE_DIR: &str = "./ArkAssets";

/// Default number of download lanes
pub const DEFAULT_THREADS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Game server to download from
    pub server: Server,

    /// Endpoint override; `None` uses the server's own
    pub endpoints: Option<ServerEndpoints>,

    /// Root of all downloaded and extracted files
    pub save_dir: PathBuf,

    /// Number of concurrent download lanes
    pub threads: usize,

    /// Package keys to download; `None` downloads every package
    pub packages: Option<Vec<String>>,

    /// Decode and extract every file, not only `.ab` bundles
    pub unpack_all: bool,

    /// Retry policy for manifest and asset requests
    #[serde(skip)]
    pub retry: RetryPolicy,

    /// HTTP client settings
    #[serde(skip)]
    pub http: HttpConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            server: Server::En,
            endpoints: None,
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            threads: DEFAULT_THREADS,
            packages: None,
            unpack_all: false,
            retry: RetryPolicy::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Split a comma separated package list, dropping empty entries
pub fn parse_package_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

impl PipelineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let server = match std::env::var("ARKASSETS_SERVER") {
            Ok(name) => name.parse::<Server>().map_err(ProtocolError::Parse)?,
            Err(_) => defaults.server,
        };

        Ok(Self {
            server,
            save_dir: std::env::var("ARKASSETS_SAVEDIR").map_or(defaults.save_dir, PathBuf::from),
            threads: std::env::var("ARKASSETS_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_THREADS),
            packages: std::env::var("ARKASSETS_PACKAGES")
                .ok()
                .map(|list| parse_package_list(&list))
                .filter(|keys| !keys.is_empty()),
            retry: RetryPolicy::from_env(),
            http: HttpConfig::from_env(),
            ..defaults
        })
    }

    /// Endpoints in effect for this run
    pub fn endpoints(&self) -> ServerEndpoints {
        self.endpoints
            .clone()
            .unwrap_or_else(|| self.server.endpoints())
    }

    /// Lane count, never zero
    pub fn lanes(&self) -> usize {
        self.threads.max(1)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.server, Server::En);
        assert_eq!(config.save_dir, PathBuf::from("./ArkAssets"));
        assert_eq!(config.lanes(), 4);
        assert!(config.packages.is_none());
        assert_eq!(config.endpoints(), Server::En.endpoints());
    }

    #[test]
    fn test_endpoint_override_and_lanes() {
        let config = PipelineConfig {
            endpoints: Some(ServerEndpoints::custom("http://127.0.0.1:9", "official")),
            threads: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.endpoints().cdn_base, "http://127.0.0.1:9");
        assert_eq!(config.lanes(), 1);
    }

    #[test]
    fn test_package_list() {
        assert_eq!(
            parse_package_list("gamedata/levels, arts/ui,,"),
            vec!["gamedata/levels", "arts/ui"]
        );
        assert!(parse_package_list(" , ").is_empty());
    }
}
