//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the TOML file and environment variables.

use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Resolve a batch of domains to addresses, nameservers and DNSSEC presence.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Domains to resolve.
    #[arg(value_name = "DOMAIN")]
    pub domains: Vec<String>,

    /// Read additional domains from a file, one per line (`-` for stdin).
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Timeout for a single DNS query in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Upper bound for resolving one domain in milliseconds.
    #[arg(long, value_name = "MS")]
    pub per_domain_timeout_ms: Option<u64>,

    /// Maximum number of domains resolved concurrently.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Nameserver to use instead of the system resolvers (repeatable).
    #[arg(long = "nameserver", value_name = "IP[:PORT]")]
    pub nameservers: Vec<String>,

    /// Retries after the first attempt for transient failures.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Trace identifier copied into every result.
    #[arg(long, value_name = "ID")]
    pub trace_id: Option<String>,

    /// Parent span identifier copied into every result.
    #[arg(long, value_name = "ID")]
    pub parent_span_id: Option<String>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pub pretty: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> std::result::Result<Map<Profile, Dict>, Error> {
        let mut dns = Dict::new();

        if let Some(timeout) = self.timeout_ms {
            dns.insert("timeout_ms".into(), Value::from(timeout));
        }
        if let Some(timeout) = self.per_domain_timeout_ms {
            dns.insert("per_domain_timeout_ms".into(), Value::from(timeout));
        }
        if let Some(concurrency) = self.concurrency {
            dns.insert("concurrency".into(), Value::from(concurrency as u64));
        }
        if !self.nameservers.is_empty() {
            dns.insert("nameservers".into(), Value::from(self.nameservers.clone()));
        }
        if let Some(retries) = self.retries {
            dns.insert("retries".into(), Value::from(retries));
        }

        let mut dict = Dict::new();
        if !dns.is_empty() {
            dict.insert("dns".into(), Value::from(dns));
        }
        // Only an explicit flag overrides the file; absence keeps its value.
        if self.pretty {
            dict.insert("pretty".into(), Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

impl Cli {
    /// Gathers the domains named on the command line and in `--file`.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn collect_domains(&self) -> Result<Vec<String>> {
        let mut domains = self.domains.clone();
        if let Some(path) = &self.file {
            let contents = if path.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())
                    .context("failed to read domains from stdin")?
            } else {
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read domains from {}", path.display()))?
            };
            domains.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }
        Ok(domains)
    }
}
