//! Human-readable output for the starttls-check CLI.
//!
//! Header, progress spinner and the end-of-run adoption summary. Structured
//! output (`--json`, `--summary-json`) bypasses this module entirely.

use console::{style, Term};
use starttls_check_lib::{AggregatedScan, BatchStats, ScanConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Domains listed per mode before the list is cut short.
const LIST_PREVIEW: usize = 10;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner on stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a spinner, or return `None` when stderr is not a terminal.
    pub fn start(message: String) -> Option<Self> {
        if !Term::stderr().is_term() {
            return None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

pub fn print_header(config: &ScanConfig, file: Option<&str>) {
    let input = match file {
        None | Some("-") => "stdin",
        Some(path) => path,
    };
    println!(
        "{} {} {}",
        style("starttls-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!("- Scanning {}", input)).dim(),
    );
    println!(
        "{}",
        style(format!(
            "Source: {} | Column: {} | Workers: {} | Timeout: {}s",
            config.source,
            config.column,
            config.pool_size.get(),
            config.timeout.as_secs()
        ))
        .dim()
    );
    println!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the adoption summary once the scan has finished.
pub fn print_summary(scan: &AggregatedScan, stats: &BatchStats) {
    println!(
        "  {} {}",
        style("── Summary ").bold(),
        style("─".repeat(44)).dim()
    );
    println!("  Domains scanned:     {}", scan.attempted);
    println!("  With mail hosts:     {}", scan.with_mxs);
    println!(
        "  MTA-STS enforce:     {}",
        style(scan.mta_sts_enforce).green().bold()
    );
    println!(
        "  MTA-STS testing:     {}",
        style(scan.mta_sts_testing).yellow()
    );
    println!(
        "  MTA-STS adoption:    {}",
        style(format_percent(scan.percent_mta_sts())).bold()
    );

    if !scan.mta_sts_enforce_list.is_empty() {
        println!();
        println!("  {}", style("Enforcing:").green());
        println!("    {}", format_domain_list(&scan.mta_sts_enforce_list, LIST_PREVIEW));
    }
    if !scan.mta_sts_testing_list.is_empty() {
        println!();
        println!("  {}", style("Testing:").yellow());
        println!("    {}", format_domain_list(&scan.mta_sts_testing_list, LIST_PREVIEW));
    }

    println!();
    println!("{}", style(format_run_stats(stats)).dim());
}

fn format_percent(percent: f64) -> String {
    format!("{:.2}%", percent)
}

/// Comma-join up to `limit` domains, noting how many were left out.
fn format_domain_list(domains: &[String], limit: usize) -> String {
    let shown = domains
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if domains.len() > limit {
        format!("{} ... and {} more", shown, domains.len() - limit)
    } else {
        shown
    }
}

fn format_run_stats(stats: &BatchStats) -> String {
    let mut line = format!(
        "{} domain{} checked in {}",
        stats.delivered,
        if stats.delivered == 1 { "" } else { "s" },
        format_elapsed(stats.elapsed)
    );
    if stats.skipped > 0 {
        line.push_str(&format!(", {} empty row{} skipped", stats.skipped, if stats.skipped == 1 { "" } else { "s" }));
    }
    line
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("d{}.example", i)).collect()
    }

    #[test]
    fn test_domain_list_within_limit() {
        assert_eq!(format_domain_list(&domains(2), 10), "d0.example, d1.example");
        assert_eq!(format_domain_list(&[], 10), "");
    }

    #[test]
    fn test_domain_list_truncated() {
        let formatted = format_domain_list(&domains(12), 2);
        assert_eq!(formatted, "d0.example, d1.example ... and 10 more");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.0), "0.00%");
        assert_eq!(format_percent(100.0 / 3.0), "33.33%");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn test_run_stats_mentions_skipped_rows() {
        let stats = BatchStats {
            submitted: 3,
            skipped: 1,
            delivered: 3,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(
            format_run_stats(&stats),
            "3 domains checked in 1.0s, 1 empty row skipped"
        );

        let stats = BatchStats {
            submitted: 1,
            skipped: 0,
            delivered: 1,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(format_run_stats(&stats), "1 domain checked in 1.0s");
    }
}
