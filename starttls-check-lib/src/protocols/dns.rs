//! MX record lookup.
//!
//! The built-in check takes a domain's mail exchangers from DNS. The lookup
//! sits behind [`MxResolver`] so callers can substitute their own resolver.

use crate::error::ScanError;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;

/// Source of MX records for a domain.
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Mail exchanger hostnames for `domain`, most preferred first.
    ///
    /// A domain without MX records yields an empty list, not an error.
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, ScanError>;
}

/// [`MxResolver`] backed by the system's DNS configuration.
#[derive(Clone)]
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// Use the system resolver configuration, or public defaults when it
    /// cannot be read.
    pub fn with_timeout(timeout: Duration) -> Self {
        let (config, mut opts) = hickory_resolver::system_conf::read_system_conf()
            .unwrap_or_else(|e| {
                tracing::debug!("using default resolver configuration: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            });
        opts.timeout = timeout;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl MxResolver for DnsResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, ScanError> {
        let fqdn = format!("{}.", domain);
        match self.resolver.mx_lookup(fqdn.as_str()).await {
            Ok(lookup) => Ok(mx_hosts(
                lookup
                    .iter()
                    .map(|mx| (mx.preference(), mx.exchange().to_utf8())),
            )),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(ScanError::network_with_source(
                    format!("MX lookup for {} failed", domain),
                    e.to_string(),
                )),
            },
        }
    }
}

/// Order records by preference, normalize names and drop duplicates and
/// null MX entries (`.`).
fn mx_hosts<I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = (u16, String)>,
{
    let mut records: Vec<(u16, String)> = records
        .into_iter()
        .map(|(preference, host)| (preference, host.trim_end_matches('.').to_lowercase()))
        .filter(|(_, host)| !host.is_empty())
        .collect();
    records.sort();

    let mut hosts: Vec<String> = Vec::with_capacity(records.len());
    for (_, host) in records {
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}
