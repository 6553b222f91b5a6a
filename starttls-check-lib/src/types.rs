//! Core data types flowing through a scan.
//!
//! This module defines the per-domain work product handed from the check
//! function to result handlers, and the runtime configuration of a batch.

use crate::result::CheckResult;
use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Everything a check function found out about one domain.
///
/// Pipeline and aggregator only look at `domain`, the number of
/// `hostname_results` and `mta_sts_result.mode`; the rest belongs to
/// whichever check function produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResult {
    /// The domain name that was checked (e.g., "example.com")
    pub domain: String,

    /// Root of the domain's check tree
    pub result: CheckResult,

    /// One check tree per mail exchanger. Empty when the domain has no MX
    /// hosts, i.e. it is not an email domain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hostname_results: BTreeMap<String, CheckResult>,

    /// Outcome of the MTA-STS policy lookup, if one was attempted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mta_sts_result: Option<MtaStsResult>,
}

impl DomainResult {
    /// Create an empty result whose root check is named after the domain.
    pub fn new<D: Into<String>>(domain: D) -> Self {
        let domain = domain.into();
        Self {
            result: CheckResult::new(domain.clone()),
            domain,
            hostname_results: BTreeMap::new(),
            mta_sts_result: None,
        }
    }

    /// Record the checks for one mail exchanger. Only its status is folded
    /// into the root result; the tree itself lives in `hostname_results`.
    pub fn add_hostname_result(&mut self, hostname: CheckResult) -> &mut Self {
        self.result.status = self.result.status.combine(hostname.status);
        self.hostname_results.insert(hostname.name.clone(), hostname);
        self
    }

    /// Attach the MTA-STS outcome and fold its status into the root result.
    pub fn set_mta_sts_result(&mut self, mta_sts: MtaStsResult) -> &mut Self {
        self.result.add_check(mta_sts.result.clone());
        self.mta_sts_result = Some(mta_sts);
        self
    }

    /// Whether any mail exchanger was found for the domain.
    pub fn has_mail_hosts(&self) -> bool {
        !self.hostname_results.is_empty()
    }
}

/// Deployment stage of a domain's MTA-STS policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MtaStsMode {
    Enforce,
    Testing,
    None,
    /// Missing policy or a mode value that is not recognised
    #[default]
    #[serde(other)]
    Unknown,
}

impl MtaStsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MtaStsMode::Enforce => "enforce",
            MtaStsMode::Testing => "testing",
            MtaStsMode::None => "none",
            MtaStsMode::Unknown => "",
        }
    }
}

impl From<&str> for MtaStsMode {
    fn from(value: &str) -> Self {
        match value.trim() {
            "enforce" => MtaStsMode::Enforce,
            "testing" => MtaStsMode::Testing,
            "none" => MtaStsMode::None,
            _ => MtaStsMode::Unknown,
        }
    }
}

impl fmt::Display for MtaStsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the MTA-STS lookup for a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaStsResult {
    /// The `mta-sts` check tree
    pub result: CheckResult,

    /// Policy mode as published
    #[serde(default)]
    pub mode: MtaStsMode,

    /// MX patterns listed in the policy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mxs: Vec<String>,

    /// Raw policy file body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl MtaStsResult {
    pub fn new(result: CheckResult, mode: MtaStsMode) -> Self {
        Self {
            result,
            mode,
            mxs: Vec::new(),
            policy: None,
        }
    }
}

/// Label identifying where an aggregated scan's domains came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanSource {
    /// Bulk scan of a top-domains list
    #[default]
    TopDomains,
    /// Domains submitted by users of a front end
    Local,
}

impl ScanSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanSource::TopDomains => "TOP_DOMAINS",
            ScanSource::Local => "LOCAL",
        }
    }
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanSource {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-domains" => Ok(ScanSource::TopDomains),
            "local" => Ok(ScanSource::Local),
            other => Err(ScanError::config(format!(
                "Unknown scan source '{}', expected 'top-domains' or 'local'",
                other
            ))),
        }
    }
}

/// Worker pool size used when none (or an invalid one) is configured.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Largest accepted pool size; larger requests are clamped to it.
pub const MAX_POOL_SIZE: usize = 4096;

/// Number of parallel workers in a batch run. Always in
/// `1..=MAX_POOL_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "usize", into = "usize")]
pub struct PoolSize(usize);

impl PoolSize {
    /// Use `size` if it is positive, otherwise the default.
    pub fn new(size: usize) -> Self {
        match size {
            0 => Self(DEFAULT_POOL_SIZE),
            size if size > MAX_POOL_SIZE => {
                tracing::debug!(
                    "pool size {} exceeds the maximum, using {}",
                    size,
                    MAX_POOL_SIZE
                );
                Self(MAX_POOL_SIZE)
            }
            size => Self(size),
        }
    }

    /// Resolve a textual setting (environment variable, flag). Missing,
    /// unparsable and non-positive values fall back to the default.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().parse::<i64>()) {
            Some(Ok(size)) if size > 0 => Self::new(usize::try_from(size).unwrap_or(MAX_POOL_SIZE)),
            Some(_) => {
                tracing::debug!(
                    "ignoring invalid pool size {:?}, using {}",
                    raw,
                    DEFAULT_POOL_SIZE
                );
                Self(DEFAULT_POOL_SIZE)
            }
            None => Self(DEFAULT_POOL_SIZE),
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for PoolSize {
    fn default() -> Self {
        Self(DEFAULT_POOL_SIZE)
    }
}

impl From<usize> for PoolSize {
    fn from(size: usize) -> Self {
        Self::new(size)
    }
}

impl From<PoolSize> for usize {
    fn from(size: PoolSize) -> Self {
        size.0
    }
}

/// Resolved configuration for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of parallel workers
    pub pool_size: PoolSize,

    /// Zero-based CSV column holding the domain
    pub column: usize,

    /// Whether the first CSV row is a header row
    pub has_headers: bool,

    /// Label recorded on the aggregated scan
    pub source: ScanSource,

    /// Timeout for each network operation of the built-in check
    /// Default: 10 seconds
    #[serde(skip)]
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pool_size: PoolSize::default(),
            column: 0,
            has_headers: false,
            source: ScanSource::TopDomains,
            timeout: Duration::from_secs(10),
        }
    }
}

impl ScanConfig {
    pub fn with_pool_size<P: Into<PoolSize>>(mut self, pool_size: P) -> Self {
        self.pool_size = pool_size.into();
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn with_source(mut self, source: ScanSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
