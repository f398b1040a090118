//! Configuration: the loaded [`Config`], the [`ConfigLoader`] seam the
//! supervisor reloads through, and validation into typed [`ItemSpec`]s.

use crate::{ConfigError, ValidationError};
use serde::{
    Deserialize, Deserializer,
    de::{Error as _, Unexpected},
};
use std::{
    path::PathBuf,
    time::Duration,
};
use tracing::{debug, warn};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8125;

/// A loaded configuration. Never mutated after load; a reload produces a
/// fresh value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Host of the statsd collector.
    #[serde(default = "default_host")]
    pub statsd_host: String,

    /// Port of the statsd collector. Written either as a number or as a
    /// quoted string.
    #[serde(default = "default_port", deserialize_with = "port")]
    pub statsd_port: u16,

    /// Prefix for every stat name. Empty means no prefix.
    #[serde(default)]
    pub prefix: String,

    /// Items to sample, in file order.
    #[serde(default)]
    pub items: Vec<ConfigItem>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn port<'de, D: Deserializer<'de>>(de: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(de)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::invalid_value(Unexpected::Str(&text), &"a port number")),
    }
}

/// One item as written in the config file. Kinds are kept as strings here so
/// that a typo is reported by [`Config::validate`] rather than as a parse
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigItem {
    /// Stat name to send this item as.
    pub name: String,

    /// Sampler type: `file`, `bash`, `cpu`, `memory` or `uptime`.
    #[serde(rename = "type")]
    pub kind: String,

    /// File path, shell command, or CPU counter name, depending on `kind`.
    #[serde(default)]
    pub path: String,

    /// Seconds between polls.
    pub interval: u64,

    /// Metric type: `counter`, `set` or `gauge`.
    pub metric: String,

    /// Send the difference between consecutive readings. Counters only.
    #[serde(default)]
    pub delta: bool,
}

/// The source a sampler reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    File,
    Bash,
    Cpu,
    Memory,
    Uptime,
}

impl SamplerKind {
    /// Parse a sampler type as written in the config file.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "bash" => Some(Self::Bash),
            "cpu" => Some(Self::Cpu),
            "memory" => Some(Self::Memory),
            "uptime" => Some(Self::Uptime),
            _ => None,
        }
    }
}

/// statsd metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Set,
    Gauge,
}

impl MetricKind {
    /// Parse a metric type as written in the config file.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(Self::Counter),
            "set" => Some(Self::Set),
            "gauge" => Some(Self::Gauge),
            _ => None,
        }
    }

    /// The statsd type code for this metric.
    pub const fn code(self) -> char {
        match self {
            Self::Counter => 'c',
            Self::Set => 's',
            Self::Gauge => 'g',
        }
    }
}

/// A validated item. Each sample taker owns its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub name: String,
    pub sampler: SamplerKind,
    pub source: String,
    pub interval: Duration,
    pub metric: MetricKind,
    delta: bool,
}

impl ItemSpec {
    /// True if emitted values are differences between consecutive readings.
    /// Only counters are ever delta-adjusted.
    pub const fn is_delta(&self) -> bool {
        self.delta && matches!(self.metric, MetricKind::Counter)
    }
}

impl TryFrom<&ConfigItem> for ItemSpec {
    type Error = ValidationError;

    fn try_from(item: &ConfigItem) -> Result<Self, Self::Error> {
        let sampler =
            SamplerKind::parse(&item.kind).ok_or_else(|| ValidationError::UnknownSampler {
                item: item.name.clone(),
                kind: item.kind.clone(),
            })?;
        let metric =
            MetricKind::parse(&item.metric).ok_or_else(|| ValidationError::UnknownMetric {
                item: item.name.clone(),
                kind: item.metric.clone(),
            })?;
        if item.interval == 0 {
            return Err(ValidationError::ZeroInterval {
                item: item.name.clone(),
            });
        }
        if item.delta && metric != MetricKind::Counter {
            warn!(
                item = %item.name,
                metric = %item.metric,
                "delta is ignored for non-counter items"
            );
        }

        Ok(Self {
            name: item.name.clone(),
            sampler,
            source: item.path.clone(),
            interval: Duration::from_secs(item.interval),
            metric,
            delta: item.delta,
        })
    }
}

impl Config {
    /// Validate every item. Any failure rejects the whole config.
    pub fn validate(&self) -> Result<Vec<ItemSpec>, ValidationError> {
        self.items.iter().map(ItemSpec::try_from).collect()
    }

    /// Parse a config from YAML text. The prefix is left as written.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

/// Where the supervisor gets its configuration from. Called once per
/// generation, so every call must re-read the underlying source.
pub trait ConfigLoader {
    fn load(&self) -> impl Future<Output = Result<Config, ConfigError>> + Send;
}

/// Loads configuration from a YAML file on disk.
#[derive(Debug, Clone)]
pub struct YamlConfigLoader {
    path: PathBuf,
}

impl YamlConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigLoader for YamlConfigLoader {
    async fn load(&self) -> Result<Config, ConfigError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;
        let mut config = Config::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        if config.prefix.is_empty() {
            config.prefix = sysinfo::System::host_name().unwrap_or_default();
        }

        debug!(path = %self.path.display(), items = config.items.len(), "loaded config");
        Ok(config)
    }
}
