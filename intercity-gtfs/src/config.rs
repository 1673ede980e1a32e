//! Run configuration.

use std::path::PathBuf;

use crate::assemble::CoverageRegion;
use crate::feed::FeedConfig;
use crate::reconcile::ReconcilerConfig;
use crate::registry::{RegistryCacheConfig, RegistryClientConfig};
use crate::schedule::ParserConfig;
use crate::temporal::TemporalResolver;

/// Errors in the environment the binary is started with.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Everything one conversion needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Schedule export, zipped as delivered or a bare CSV.
    pub input: PathBuf,
    /// GTFS archive to produce.
    pub output: PathBuf,
    /// Where unmatched stops are listed.
    pub missing_report: PathBuf,
    /// Download the registry even when the cached snapshot is fresh.
    pub refresh_registry: bool,
    pub parser: ParserConfig,
    pub registry_client: RegistryClientConfig,
    pub registry_cache: RegistryCacheConfig,
    pub reconciler: ReconcilerConfig,
    pub resolver: TemporalResolver,
    pub coverage: CoverageRegion,
    pub feed: FeedConfig,
}

impl PipelineConfig {
    /// Defaults for reading `input`.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: PathBuf::from("pkpic.zip"),
            missing_report: PathBuf::from("stops_missing.csv"),
            refresh_registry: false,
            parser: ParserConfig::default(),
            registry_client: RegistryClientConfig::default(),
            registry_cache: RegistryCacheConfig::default(),
            reconciler: ReconcilerConfig::default(),
            resolver: TemporalResolver::default(),
            coverage: CoverageRegion::default(),
            feed: FeedConfig::default(),
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = path.into();
        self
    }

    pub fn with_missing_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing_report = path.into();
        self
    }

    pub fn with_registry_cache(mut self, cache: RegistryCacheConfig) -> Self {
        self.registry_cache = cache;
        self
    }

    pub fn with_feed(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`, which maps variable names
    /// to values. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let input = get("INTERCITY_INPUT").ok_or(ConfigError::Missing("INTERCITY_INPUT"))?;
        let mut config = Self::new(input);

        if let Some(output) = get("GTFS_OUTPUT") {
            config.output = output.into();
        }
        if let Some(report) = get("MISSING_STOPS_OUTPUT") {
            config.missing_report = report.into();
        }
        if let Some(snapshot) = get("REGISTRY_SNAPSHOT") {
            config.registry_cache = RegistryCacheConfig::new(snapshot);
        }
        if let Some(refresh) = get("REGISTRY_REFRESH") {
            config.refresh_registry = match refresh.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "REGISTRY_REFRESH",
                        value: refresh,
                    });
                }
            };
        }
        if let Some(url) = get("OVERPASS_URL") {
            config.registry_client = config.registry_client.with_base_url(url);
        }

        match (get("FEED_PUBLISHER_NAME"), get("FEED_PUBLISHER_URL")) {
            (Some(name), Some(url)) => config.feed = config.feed.with_publisher(name, url),
            (Some(_), None) => return Err(ConfigError::Missing("FEED_PUBLISHER_URL")),
            (None, Some(_)) => return Err(ConfigError::Missing("FEED_PUBLISHER_NAME")),
            (None, None) => {}
        }
        if let Some(version) = get("FEED_VERSION") {
            config.feed = config.feed.with_version(version);
        }

        Ok(config)
    }
}
