// starttls-check-lib/tests/integration.rs

//! Integration tests for the public scan API: CSV input through the worker
//! pool into the aggregating handler.

use starttls_check_lib::{
    checks, run_batch, AggregatedScan, CheckResult, CsvIdentifiers, DomainResult,
    JsonLinesPrinter, MailChecker, MtaStsMode, MtaStsResult, PoolSize, ResultHandler, ScanError,
    ScanSource, Status,
};
use std::io::Write;
use tempfile::NamedTempFile;

/// Offline stand-in for the mail checker. The label before the first '.'
/// picks the outcome.
async fn fake_check(domain: String) -> DomainResult {
    let mut result = DomainResult::new(domain.as_str());
    let label = domain.split('.').next().unwrap_or_default().to_string();

    let mode = match label.split('-').next() {
        Some("enforce") => MtaStsMode::Enforce,
        Some("testing") => MtaStsMode::Testing,
        Some("none") => MtaStsMode::None,
        _ => return result,
    };

    let mut host = CheckResult::new(format!("mx.{}", domain));
    let mut connectivity = CheckResult::new(checks::CONNECTIVITY);
    connectivity.success();
    host.add_check(connectivity);
    result.add_hostname_result(host);

    let mut policy = CheckResult::new(checks::MTA_STS);
    policy.success();
    result.set_mta_sts_result(MtaStsResult::new(policy, mode));
    result
}

fn csv_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_csv_scan_aggregates_adoption() {
    let file = csv_file(
        "rank,domain\n\
         1,enforce-a.example\n\
         2,testing-b.example\n\
         3,none-c.example\n\
         4,plain-d.example\n\
         5,\n\
         6,enforce-e.example\n",
    );
    let identifiers = CsvIdentifiers::from_path(file.path(), 1, true).unwrap();
    let mut scan = AggregatedScan::new(ScanSource::TopDomains);

    let stats = run_batch(identifiers, fake_check, &mut scan, PoolSize::new(3))
        .await
        .unwrap();

    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.submitted, 5);
    assert_eq!(scan.attempted, 5);
    assert_eq!(scan.with_mxs, 4);
    assert_eq!(scan.mta_sts_enforce, 2);
    assert_eq!(scan.mta_sts_testing, 1);
    assert_eq!(scan.total_mta_sts(), 3);
    assert!((scan.percent_mta_sts() - 75.0).abs() < f64::EPSILON);

    let mut enforced = scan.mta_sts_enforce_list.clone();
    enforced.sort();
    assert_eq!(enforced, vec!["enforce-a.example", "enforce-e.example"]);
    assert_eq!(scan.mta_sts_testing_list, vec!["testing-b.example"]);
}

#[tokio::test]
async fn test_json_lines_and_aggregate_together() {
    let input = "enforce-a.example\nplain-b.example\n";
    let identifiers = CsvIdentifiers::from_reader(input.as_bytes(), 0, false);
    let mut scan = AggregatedScan::new(ScanSource::Local);
    let mut handler = (JsonLinesPrinter::new(Vec::new()), &mut scan);

    run_batch(identifiers, fake_check, &mut handler, PoolSize::new(2))
        .await
        .unwrap();

    let (printer, scan) = handler;
    assert_eq!(printer.written(), 2);
    let output = String::from_utf8(printer.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines
        .iter()
        .any(|line| line["domain"] == "enforce-a.example"
            && line["mta_sts_result"]["mode"] == "enforce"));

    assert_eq!(scan.attempted, 2);
    assert_eq!(scan.with_mxs, 1);
    assert_eq!(scan.source, ScanSource::Local);
}

#[tokio::test]
async fn test_malformed_csv_stops_scan_after_delivering_earlier_rows() {
    let mut bytes = b"enforce-a.example\ntesting-b.example\n".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
    bytes.extend_from_slice(b"enforce-c.example\n");
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), &bytes).unwrap();

    let identifiers = CsvIdentifiers::from_path(file.path(), 0, false).unwrap();
    let mut collected: Vec<DomainResult> = Vec::new();

    let err = run_batch(identifiers, fake_check, &mut collected, PoolSize::new(4))
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::SourceRead { .. }));
    assert!(err.is_fatal());
    let mut domains: Vec<_> = collected.iter().map(|r| r.domain.clone()).collect();
    domains.sort();
    assert_eq!(domains, vec!["enforce-a.example", "testing-b.example"]);
}

#[test]
fn test_missing_csv_file_is_reported() {
    let err = CsvIdentifiers::from_path("/nonexistent/domains.csv", 0, false).unwrap_err();
    assert!(matches!(err, ScanError::FileError { .. }));
}

#[test]
fn test_mail_checker_records_invalid_domain_without_network() {
    let checker = MailChecker::new().unwrap();
    let result = tokio_test::block_on(checker.check_domain("bad domain!"));

    assert_eq!(result.result.status, Status::Error);
    assert!(!result.has_mail_hosts());

    let mut scan = AggregatedScan::new(ScanSource::TopDomains);
    scan.handle_domain(&result);
    assert_eq!(scan.attempted, 1);
    assert_eq!(scan.with_mxs, 0);
}
