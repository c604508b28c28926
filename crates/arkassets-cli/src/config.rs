//! Command-line configuration.
//!
//! Every option can also be set through an `ARKASSETS_*` environment variable.
//! Timeouts and retry tuning are read from the environment only, see
//! [`HttpConfig::from_env`] and [`RetryPolicy::from_env`].

use arkassets_protocol::config::{DEFAULT_SAVE_DIR, DEFAULT_THREADS};
use arkassets_protocol::{HttpConfig, PipelineConfig, RetryPolicy, Server, ServerEndpoints};
use clap::Parser;
use std::path::PathBuf;

/// Arknights resource downloader configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "arkassets",
    about = "Download and unpack Arknights game resources",
    version
)]
pub struct CliConfig {
    /// Game server: official, bilibili, en, jp, kr or tw
    #[arg(short, long, env = "ARKASSETS_SERVER", default_value = "en")]
    pub server: Server,

    /// Directory that receives downloads, extracted assets and state files
    #[arg(short = 'd', long, env = "ARKASSETS_SAVEDIR", default_value = DEFAULT_SAVE_DIR)]
    pub savedir: PathBuf,

    /// Packages to download, comma separated (e.g. gamedata/levels,arts/ui); all when empty
    #[arg(short, long, env = "ARKASSETS_PACKAGES", value_delimiter = ',')]
    pub packages: Vec<String>,

    /// Concurrent download lanes
    #[arg(short, long, env = "ARKASSETS_THREADS", default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Decode and extract every file, not only .ab bundles
    #[arg(long, env = "ARKASSETS_UNPACK_ALL")]
    pub unpack_all: bool,

    /// List the server's packages and exit
    #[arg(long)]
    pub list: bool,

    /// Also write log output to this file
    #[arg(long, env = "ARKASSETS_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Do not draw progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Override the CDN base URL (the server's asset tag is kept)
    #[arg(long, env = "ARKASSETS_CDN_BASE", hide = true)]
    pub cdn_base: Option<String>,
}

impl CliConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Selected package keys, `None` for every package
    pub fn package_selection(&self) -> Option<Vec<String>> {
        let keys: Vec<String> = self
            .packages
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        (!keys.is_empty()).then_some(keys)
    }

    /// Pipeline configuration for this invocation
    pub fn pipeline_config(&self) -> PipelineConfig {
        let endpoints = self.cdn_base.as_deref().map(|base| {
            let defaults = self.server.endpoints();
            ServerEndpoints::custom(base, &defaults.asset_tag)
        });

        PipelineConfig {
            server: self.server,
            endpoints,
            save_dir: self.savedir.clone(),
            threads: self.threads,
            packages: self.package_selection(),
            unpack_all: self.unpack_all,
            retry: RetryPolicy::from_env(),
            http: HttpConfig::from_env(),
        }
    }
}
