//! Built-in domain check.
//!
//! `MailChecker` is the check function the CLI hands to the scan pipeline.
//! For each domain it looks up the MX records, fetches the MTA-STS policy and
//! probes every mail exchanger. It never fails: every problem ends up in the
//! returned [`DomainResult`]'s check tree.

use crate::error::ScanError;
use crate::protocols::{DnsResolver, MtaStsClient, MxResolver, SmtpProbe};
use crate::types::{DomainResult, MtaStsMode, MtaStsResult, ScanConfig};
use crate::utils::{mx_matches_pattern, normalize_domain};
use std::sync::Arc;
use std::time::Duration;

/// Checks a single domain's inbound mail security.
///
/// # Example
///
/// ```rust,no_run
/// use starttls_check_lib::MailChecker;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = MailChecker::new()?;
///     let result = checker.check_domain("eff.org").await;
///     println!("{}: {}", result.domain, result.result.status);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MailChecker {
    resolver: Arc<dyn MxResolver>,
    mta_sts: MtaStsClient,
    smtp: SmtpProbe,
}

impl MailChecker {
    /// Create a checker with the default 10 second network timeout.
    pub fn new() -> Result<Self, ScanError> {
        Self::with_config(&ScanConfig::default())
    }

    pub fn with_config(config: &ScanConfig) -> Result<Self, ScanError> {
        Self::with_timeout(config.timeout)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ScanError> {
        Ok(Self {
            resolver: Arc::new(DnsResolver::with_timeout(timeout)),
            mta_sts: MtaStsClient::with_timeout(timeout)?,
            smtp: SmtpProbe::with_timeout(timeout),
        })
    }

    /// Replace the DNS resolver used for MX lookups.
    pub fn with_resolver<R: MxResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Probe mail exchangers on a port other than 25.
    pub fn with_smtp_port(mut self, port: u16) -> Self {
        self.smtp = self.smtp.with_port(port);
        self
    }

    /// Check one domain.
    ///
    /// The process:
    /// 1. Normalizes the domain; an invalid name is recorded as an error
    /// 2. Looks up the MX records; a failed lookup is recorded as an error
    /// 3. Fetches and validates the MTA-STS policy, and checks that it
    ///    covers every MX host
    /// 4. Probes every MX host over SMTP
    pub async fn check_domain(&self, domain: &str) -> DomainResult {
        let domain = match normalize_domain(domain) {
            Ok(domain) => domain,
            Err(e) => {
                let mut result = DomainResult::new(domain.trim());
                result.result.error(e);
                return result;
            }
        };

        let mut result = DomainResult::new(domain.as_str());
        let hosts = match self.resolver.lookup_mx(&domain).await {
            Ok(hosts) => hosts,
            Err(e) => {
                result
                    .result
                    .error(format_args!("Could not look up MX records: {}", e));
                Vec::new()
            }
        };

        let mut mta_sts = self.mta_sts.check_domain(&domain).await;
        check_policy_covers_hosts(&mut mta_sts, &hosts);

        for host in &hosts {
            let hostname = self.smtp.check_hostname(host).await;
            result.add_hostname_result(hostname);
        }
        result.set_mta_sts_result(mta_sts);

        tracing::debug!(
            %domain,
            status = %result.result.status,
            hosts = result.hostname_results.len(),
            "domain checked"
        );
        result
    }
}

/// Flag MX hosts found in DNS that a testing or enforcing policy does not
/// list.
fn check_policy_covers_hosts(mta_sts: &mut MtaStsResult, hosts: &[String]) {
    if !matches!(mta_sts.mode, MtaStsMode::Enforce | MtaStsMode::Testing) {
        return;
    }
    for host in hosts {
        if !mta_sts
            .mxs
            .iter()
            .any(|pattern| mx_matches_pattern(pattern, host))
        {
            mta_sts.result.failure(format_args!(
                "{} appears in the DNS record but not the MTA-STS policy file",
                host
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregatedScan;
    use crate::handler::ResultHandler;
    use crate::result::{checks, CheckResult, Status};
    use crate::types::ScanSource;
    use async_trait::async_trait;

    /// Resolver answering from a fixed record list.
    struct StaticResolver(Result<Vec<String>, String>);

    #[async_trait]
    impl MxResolver for StaticResolver {
        async fn lookup_mx(&self, _domain: &str) -> Result<Vec<String>, ScanError> {
            self.0.clone().map_err(ScanError::network)
        }
    }

    /// A local port with nothing listening on it.
    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn checker(resolver: StaticResolver) -> MailChecker {
        MailChecker::with_timeout(Duration::from_secs(2))
            .unwrap()
            .with_resolver(resolver)
    }

    #[tokio::test]
    async fn test_invalid_domain_is_recorded_not_raised() {
        let checker = checker(StaticResolver(Ok(Vec::new())));
        let result = checker.check_domain("not a domain").await;

        assert_eq!(result.domain, "not a domain");
        assert_eq!(result.result.status, Status::Error);
        assert!(result.result.messages[0].starts_with("Error: Invalid domain"));
        assert!(!result.has_mail_hosts());
        assert!(result.mta_sts_result.is_none());
    }

    #[tokio::test]
    async fn test_mail_domain_without_policy_counts_as_mail_domain() {
        let port = closed_port().await;
        let checker = checker(StaticResolver(Ok(vec!["127.0.0.1".to_string()])))
            .with_smtp_port(port);

        let result = checker.check_domain("no-policy.invalid").await;

        assert!(result.has_mail_hosts());
        let host = &result.hostname_results["127.0.0.1"];
        assert!(!host.subcheck_succeeded(checks::CONNECTIVITY));
        assert_eq!(
            result.mta_sts_result.as_ref().unwrap().mode,
            MtaStsMode::Unknown
        );

        let mut scan = AggregatedScan::new(ScanSource::Local);
        scan.handle_domain(&result);
        assert_eq!(scan.with_mxs, 1);
        assert_eq!(scan.total_mta_sts(), 0);
        assert_eq!(scan.percent_mta_sts(), 0.0);
    }

    #[tokio::test]
    async fn test_domain_without_mx_records_has_no_hosts() {
        let checker = checker(StaticResolver(Ok(Vec::new())));
        let result = checker.check_domain("no-mail.invalid").await;

        assert!(!result.has_mail_hosts());
        assert!(result.mta_sts_result.is_some());
    }

    #[tokio::test]
    async fn test_failed_mx_lookup_is_recorded() {
        let checker = checker(StaticResolver(Err("SERVFAIL".to_string())));
        let result = checker.check_domain("broken-dns.invalid").await;

        assert!(!result.has_mail_hosts());
        assert_eq!(result.result.status, Status::Error);
        assert!(result
            .result
            .messages
            .iter()
            .any(|m| m.contains("Could not look up MX records") && m.contains("SERVFAIL")));
    }

    #[test]
    fn test_policy_must_cover_dns_hosts() {
        let mut mta_sts = MtaStsResult::new(CheckResult::new(checks::MTA_STS), MtaStsMode::Enforce);
        mta_sts.mxs = vec!["*.mail.example.com".to_string()];
        let hosts = vec![
            "a.mail.example.com".to_string(),
            "backup.example.net".to_string(),
        ];

        check_policy_covers_hosts(&mut mta_sts, &hosts);

        assert_eq!(mta_sts.result.status, Status::Failure);
        assert_eq!(mta_sts.result.messages.len(), 1);
        assert!(mta_sts.result.messages[0].contains("backup.example.net"));
    }

    #[test]
    fn test_policy_coverage_ignored_in_none_mode() {
        let mut mta_sts = MtaStsResult::new(CheckResult::new(checks::MTA_STS), MtaStsMode::None);
        check_policy_covers_hosts(&mut mta_sts, &["mx.example.com".to_string()]);
        assert_eq!(mta_sts.result.status, Status::Success);
    }

    #[tokio::test]
    #[ignore]
    async fn test_real_domain() {
        let checker = MailChecker::new().unwrap();
        let result = checker.check_domain("gmail.com").await;
        assert!(result.has_mail_hosts());
        assert!(result.mta_sts_result.is_some());
    }
}
