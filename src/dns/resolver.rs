use crate::{
    config::ResolveOptions,
    core::{Answer, DnsTransport, QueryError, RecordKind},
    dns::DnsError,
};
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::{
        op::ResponseCode,
        rr::{RData, RecordType},
        xfer::Protocol,
        ProtoErrorKind,
    },
    system_conf, ResolveError, ResolveErrorKind, TokioResolver,
};
use std::{
    io,
    net::{IpAddr, SocketAddr},
};
use tracing::{trace, warn};

/// DNS transport implementation using hickory-resolver
pub struct HickoryDnsTransport {
    resolver: TokioResolver,
    nameservers: Vec<SocketAddr>,
}

impl HickoryDnsTransport {
    /// Creates a transport from the batch options.
    ///
    /// Explicit `nameservers` replace the system configuration. Retries and
    /// caching are switched off in hickory because the batch resolver does
    /// both itself.
    pub fn from_options(options: &ResolveOptions) -> Result<Self, DnsError> {
        let resolver_config = match &options.nameservers {
            Some(nameservers) if !nameservers.is_empty() => {
                let mut custom_config = ResolverConfig::new();
                for nameserver in nameservers {
                    let socket_addr = parse_nameserver(nameserver)?;
                    custom_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
                    custom_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Tcp));
                }
                custom_config
            }
            _ => {
                let (system_config, _) = system_conf::read_system_conf()
                    .map_err(|e| DnsError::Transport(e.to_string()))?;
                if system_config.name_servers().is_empty() {
                    warn!("No system DNS servers found, falling back to Cloudflare DNS.");
                    ResolverConfig::cloudflare()
                } else {
                    system_config
                }
            }
        };

        // Drop search domains; every query is for a fully qualified name.
        let mut resolver_config_with_no_search = ResolverConfig::new();
        for ns in resolver_config.name_servers() {
            resolver_config_with_no_search.add_name_server(ns.clone());
        }

        let mut nameservers: Vec<SocketAddr> = Vec::new();
        for ns in resolver_config_with_no_search.name_servers() {
            if !nameservers.contains(&ns.socket_addr) {
                nameservers.push(ns.socket_addr);
            }
        }

        let mut resolver_opts = ResolverOpts::default();
        resolver_opts.timeout = options.query_timeout();
        resolver_opts.attempts = 1;
        resolver_opts.cache_size = 0;
        resolver_opts.ndots = 1;

        let resolver = hickory_resolver::Resolver::builder_with_config(
            resolver_config_with_no_search,
            TokioConnectionProvider::default(),
        )
        .with_options(resolver_opts)
        .build();

        Ok(Self {
            resolver,
            nameservers,
        })
    }

    pub fn nameservers(&self) -> &[SocketAddr] {
        &self.nameservers
    }
}

#[async_trait]
impl DnsTransport for HickoryDnsTransport {
    async fn query(&self, name: &str, kind: RecordKind) -> Result<Answer, QueryError> {
        let record_type = record_type(kind);
        let fqdn = format!("{}.", name.trim_end_matches('.'));

        let lookup = match self.resolver.lookup(fqdn.as_str(), record_type).await {
            Ok(lookup) => lookup,
            Err(e) => {
                trace!(name, %kind, error = %e, "Lookup failed");
                return map_resolve_error(&e);
            }
        };

        let matching: Vec<_> = lookup
            .records()
            .iter()
            .filter(|record| record.record_type() == record_type)
            .collect();
        let ttl = matching.iter().map(|record| record.ttl()).min();
        let records = matching
            .iter()
            .map(|record| render(record.data()))
            .collect();

        Ok(Answer::new(records, ttl))
    }

    fn nameserver(&self) -> Option<String> {
        self.nameservers.first().map(|ns| ns.ip().to_string())
    }
}

fn record_type(kind: RecordKind) -> RecordType {
    match kind {
        RecordKind::A => RecordType::A,
        RecordKind::AAAA => RecordType::AAAA,
        RecordKind::CNAME => RecordType::CNAME,
        RecordKind::NS => RecordType::NS,
        RecordKind::RRSIG => RecordType::RRSIG,
        RecordKind::DNSKEY => RecordType::DNSKEY,
    }
}

fn render(data: &RData) -> String {
    if let Some(ip) = data.ip_addr() {
        return ip.to_string();
    }
    match data {
        RData::CNAME(cname) => cname.0.to_utf8().trim_end_matches('.').to_string(),
        RData::NS(ns) => ns.0.to_utf8().trim_end_matches('.').to_string(),
        other => other.to_string(),
    }
}

/// Maps hickory's error onto the transport-neutral outcomes.
///
/// NODATA (NOERROR without records) is a verified empty answer, carrying the
/// SOA negative TTL when there is one. Any response code other than NOERROR
/// and NXDOMAIN means the upstream failed to answer.
fn map_resolve_error(err: &ResolveError) -> Result<Answer, QueryError> {
    if let ResolveErrorKind::Proto(proto) = err.kind() {
        match proto.kind() {
            ProtoErrorKind::NoRecordsFound {
                response_code,
                negative_ttl,
                ..
            } => {
                return match *response_code {
                    ResponseCode::NXDomain => Err(QueryError::NxDomain),
                    ResponseCode::NoError => Ok(Answer::new(Vec::new(), *negative_ttl)),
                    code => Err(QueryError::NoNameservers(format!(
                        "upstream answered {}",
                        code
                    ))),
                };
            }
            ProtoErrorKind::Timeout => return Err(QueryError::Timeout),
            ProtoErrorKind::Io(e) if e.kind() == io::ErrorKind::TimedOut => {
                return Err(QueryError::Timeout)
            }
            ProtoErrorKind::NoConnections => {
                return Err(QueryError::NoNameservers(proto.to_string()))
            }
            _ => {}
        }
    }
    Err(QueryError::Other(err.to_string()))
}

/// Parses `ip` or `ip:port`; the port defaults to 53.
pub fn parse_nameserver(value: &str) -> Result<SocketAddr, DnsError> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .map_err(|_| DnsError::InvalidInput(format!("invalid nameserver address '{}'", value)))
}
