//! Daemon configuration
//!
//! Built-in defaults, then an optional TOML file, then `HOSTWARD_*`
//! environment variables (`HOSTWARD_RPC__PORT=9700` sets `rpc.port`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "~/.hostward/hostward.toml";
const ENV_PREFIX: &str = "HOSTWARD";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub rpc: RpcSection,
    pub database: DatabaseSection,
    pub catalog: CatalogSection,
    pub ssh: SshSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSection {
    pub root: String,
    pub refresh_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshSection {
    pub dial_timeout_secs: u64,
    /// 0 leaves in-flight commands unbounded
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    pub format: LogFormat,
    #[serde(default)]
    pub dir: Option<String>,
}

impl DaemonConfig {
    /// Load from `HOSTWARD_CONFIG` (or the default path) and the process
    /// environment. A missing default file is fine; a missing explicit
    /// one is not.
    pub fn load() -> Result<Self> {
        let (path, required) = match std::env::var("HOSTWARD_CONFIG") {
            Ok(path) => (path, true),
            Err(_) => (DEFAULT_CONFIG_PATH.to_string(), false),
        };
        Self::load_from(
            Some((expand(&path), required)),
            Environment::with_prefix(ENV_PREFIX),
            std::env::var("HOSTWARD_LOG_FORMAT").ok(),
        )
    }

    fn load_from(
        file: Option<(PathBuf, bool)>,
        env: Environment,
        log_format: Option<String>,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("rpc.host", "127.0.0.1")?
            .set_default("rpc.port", 9631)?
            .set_default("database.path", "~/.hostward/hostward.db")?
            .set_default("catalog.root", "./commands")?
            .set_default("catalog.refresh_secs", 60)?
            .set_default("ssh.dial_timeout_secs", 10)?
            .set_default("ssh.command_timeout_secs", 0)?
            .set_default("log.format", "pretty")?;

        if let Some((path, required)) = file {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        let config = builder
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("log.format", log_format)?
            .build()
            .context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}", expand(&self.database.path).display())
    }

    pub fn database_path(&self) -> PathBuf {
        expand(&self.database.path)
    }

    pub fn catalog_root(&self) -> PathBuf {
        expand(&self.catalog.root)
    }

    pub fn catalog_refresh(&self) -> Duration {
        Duration::from_secs(self.catalog.refresh_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.dial_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        match self.ssh.command_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log.dir.as_deref().map(expand)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
