//! MTA-STS policy retrieval and validation.
//!
//! Fetches `https://mta-sts.<domain>/.well-known/mta-sts.txt` and checks it
//! against the policy format: `key: value` lines with `version: STSv1`, a
//! `mode`, one `mx` line per allowed host pattern, and a numeric `max_age`.

use crate::error::ScanError;
use crate::result::{checks, CheckResult};
use crate::types::{MtaStsMode, MtaStsResult};
use reqwest::StatusCode;
use std::time::Duration;

/// Longest `max_age` a policy may declare, in seconds (one year).
pub const MAX_POLICY_AGE: u64 = 31_557_600;

/// Policies cached for less than this many seconds get a warning.
const SHORT_POLICY_AGE: u64 = 86_400;

/// Policy files larger than this are rejected.
const MAX_POLICY_SIZE: usize = 64 * 1024;

/// A parsed policy file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MtaStsPolicy {
    pub version: Option<String>,
    pub mode: MtaStsMode,
    pub mxs: Vec<String>,
    pub max_age: Option<u64>,
}

/// Parse a policy body and report every problem on a
/// `mta-sts-policy-file` check.
pub fn validate_policy(body: &str) -> (MtaStsPolicy, CheckResult) {
    let mut result = CheckResult::new(checks::MTA_STS_POLICY_FILE);
    let mut policy = MtaStsPolicy::default();
    let mut raw_mode: Option<String> = None;
    let mut raw_max_age: Option<String> = None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            result.failure(format_args!("Malformed policy line: {}", line));
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "version" => policy.version = Some(value),
            "mode" => raw_mode = Some(value),
            "mx" => policy.mxs.push(value.to_ascii_lowercase()),
            "max_age" => raw_max_age = Some(value),
            other => {
                result.warning(format_args!("Unknown policy key: {}", other));
            }
        }
    }

    match policy.version.as_deref() {
        Some("STSv1") => {}
        Some(other) => {
            result.failure(format_args!("Unsupported policy version {}", other));
        }
        None => {
            result.failure("Policy file is missing a version");
        }
    }

    match raw_mode.as_deref().map(MtaStsMode::from) {
        Some(MtaStsMode::Unknown) => {
            result.failure(format_args!(
                "Mode must be one of 'testing', 'enforce', or 'none', got '{}'",
                raw_mode.as_deref().unwrap_or_default()
            ));
        }
        Some(mode) => policy.mode = mode,
        None => {
            result.failure("Policy file is missing a mode");
        }
    }

    if policy.mxs.is_empty() && policy.mode != MtaStsMode::None {
        result.failure("Policy file lists no MX hosts");
    }

    match raw_max_age.map(|age| age.parse::<u64>()) {
        Some(Ok(age)) if age > MAX_POLICY_AGE => {
            result.failure(format_args!(
                "max_age of {} exceeds the maximum of {}",
                age, MAX_POLICY_AGE
            ));
            policy.max_age = Some(age);
        }
        Some(Ok(age)) => {
            if age < SHORT_POLICY_AGE {
                result.warning(format_args!(
                    "max_age of {} seconds is shorter than a day",
                    age
                ));
            }
            policy.max_age = Some(age);
        }
        Some(Err(_)) => {
            result.failure("max_age must be a non-negative integer");
        }
        None => {
            result.failure("Policy file is missing max_age");
        }
    }

    result.success();
    (policy, result)
}

/// HTTP client for MTA-STS policy files.
#[derive(Clone)]
pub struct MtaStsClient {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl MtaStsClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ScanError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            // Policy hosts must answer directly.
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("starttls-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ScanError::network_with_source(
                    "Failed to create MTA-STS HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the raw policy body for `domain`.
    pub async fn fetch_policy(&self, domain: &str) -> Result<String, ScanError> {
        self.fetch_url(&policy_url(domain)).await
    }

    /// Fetch a policy body from `url`, reading at most `MAX_POLICY_SIZE`
    /// bytes.
    pub(crate) async fn fetch_url(&self, url: &str) -> Result<String, ScanError> {
        tracing::debug!(%url, "fetching MTA-STS policy");

        let mut response = tokio::time::timeout(self.timeout, self.http_client.get(url).send())
            .await
            .map_err(|_| ScanError::timeout("MTA-STS policy fetch", self.timeout))??;

        match response.status() {
            StatusCode::OK => {}
            status => {
                return Err(ScanError::network(format!(
                    "{} returned HTTP {}",
                    url,
                    status.as_u16()
                )));
            }
        }

        if let Some(length) = response.content_length() {
            if length > MAX_POLICY_SIZE as u64 {
                return Err(oversized_policy(length));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_POLICY_SIZE {
                return Err(oversized_policy((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        String::from_utf8(body)
            .map_err(|_| ScanError::network(format!("{} is not valid UTF-8", url)))
    }

    /// Fetch and validate the policy for `domain`. Problems are recorded in
    /// the returned result tree.
    pub async fn check_domain(&self, domain: &str) -> MtaStsResult {
        let mut mta_sts = CheckResult::new(checks::MTA_STS);

        match self.fetch_policy(domain).await {
            Ok(body) => {
                let (policy, policy_check) = validate_policy(&body);
                mta_sts.add_check(policy_check);
                MtaStsResult {
                    result: mta_sts,
                    mode: policy.mode,
                    mxs: policy.mxs,
                    policy: Some(body),
                }
            }
            Err(e) => {
                tracing::debug!(%domain, "no MTA-STS policy: {}", e);
                let mut policy_check = CheckResult::new(checks::MTA_STS_POLICY_FILE);
                policy_check.failure(format_args!("Couldn't fetch MTA-STS policy: {}", e));
                mta_sts.add_check(policy_check);
                MtaStsResult::new(mta_sts, MtaStsMode::Unknown)
            }
        }
    }
}

fn oversized_policy(length: u64) -> ScanError {
    ScanError::network(format!(
        "policy file is at least {} bytes, larger than {}",
        length, MAX_POLICY_SIZE
    ))
}

/// Well-known location of a domain's policy file.
pub fn policy_url(domain: &str) -> String {
    format!("https://mta-sts.{}/.well-known/mta-sts.txt", domain)
}
