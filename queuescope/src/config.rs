//! Configuration management

use anyhow::Context;
use queuescope_sqs::{PeekPolicy, RefetchPolicy, TransportLimits};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub peek: PeekPolicy,

    #[serde(default)]
    pub refetch: RefetchPolicy,

    #[serde(default)]
    pub limits: TransportLimits,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Upper bound on one API request; a peek still answers with what it
    /// gathered when this runs out
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Which queue service the tool talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Aws,
    /// Local in-memory queues, for trying the tool out
    Memory,
}

#[derive(Debug, Deserialize, Default)]
pub struct AwsConfig {
    pub region: Option<String>,
    /// Override for LocalStack, ElasticMQ and similar endpoints
    pub endpoint_url: Option<String>,
}

fn default_port() -> u16 {
    8642
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// `path` defaults to `queuescope` (any extension the `config` crate
    /// understands). Environment variables use `QUEUESCOPE__` plus `__`
    /// between sections, e.g. `QUEUESCOPE__PEEK__MIN_ROUNDS=6`.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name("queuescope").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("QUEUESCOPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        config
            .try_deserialize::<Config>()
            .context("invalid configuration")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.peek.validate().context("invalid [peek] settings")?;
        self.refetch.validate().context("invalid [refetch] settings")?;
        self.limits.validate().context("invalid [limits] settings")?;
        Ok(())
    }
}
