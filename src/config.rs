//! Configuration management for batchdns
//!
//! This module defines the main `Config` struct and the `ResolveOptions`
//! that parameterise one resolution batch. It uses the `figment` crate to
//! load configuration from a TOML file and merge it with environment
//! variables and command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Pretty-print the JSON results.
    #[serde(default)]
    pub pretty: bool,
    /// Options for the resolution batch.
    pub dns: ResolveOptions,
}

/// Options that control one resolution batch.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ResolveOptions {
    /// Timeout for a single DNS query attempt in milliseconds.
    pub timeout_ms: u64,
    /// Upper bound for resolving one domain, across all of its queries.
    pub per_domain_timeout_ms: Option<u64>,
    /// Maximum number of domains resolved at the same time.
    pub concurrency: usize,
    /// Nameservers (`ip` or `ip:port`) replacing the system resolver list.
    pub nameservers: Option<Vec<String>>,
    /// Additional attempts after the first for transient failures.
    pub retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,
    /// TTL used for cached answers when the upstream supplies none.
    pub cache_ttl_default_secs: u64,
    /// Maximum number of answers held by the batch cache.
    pub cache_capacity: u64,
    /// How DNSSEC signing is detected.
    pub dnssec_mode: DnssecMode,
}

/// DNSSEC detection strategy.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DnssecMode {
    /// Query RRSIG and DNSKEY and report whether any record is present.
    #[default]
    Presence,
    /// Skip DNSSEC queries entirely; results report `unknown`.
    Disabled,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            per_domain_timeout_ms: None,
            concurrency: 50,
            nameservers: None,
            retries: 2,
            backoff_base_ms: 100,
            cache_ttl_default_secs: 60,
            cache_capacity: 10_000,
            dnssec_mode: DnssecMode::Presence,
        }
    }
}

impl ResolveOptions {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn per_domain_timeout(&self) -> Option<Duration> {
        self.per_domain_timeout_ms.map(Duration::from_millis)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn cache_ttl_default(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_default_secs)
    }
}

impl Config {
    /// Loads the application configuration by layering defaults, the TOML
    /// file named on the command line, environment variables and finally the
    /// command-line flags themselves.
    ///
    /// # Arguments
    /// * `cli` - The parsed command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            // e.g. BATCHDNS_DNS__CONCURRENCY=10
            .merge(Env::prefixed("BATCHDNS_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            pretty: false,
            dns: ResolveOptions::default(),
        }
    }
}
