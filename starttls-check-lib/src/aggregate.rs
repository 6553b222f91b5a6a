//! Cross-domain summary statistics.
//!
//! [`AggregatedScan`] is a [`ResultHandler`] that folds a stream of domain
//! results into MTA-STS adoption counters. It has no internal locking; the
//! scan pipeline delivers results to it one at a time.

use crate::handler::ResultHandler;
use crate::types::{DomainResult, MtaStsMode, ScanSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A progress snapshot is logged every this many attempted domains.
pub const PROGRESS_INTERVAL: usize = 1000;

/// Aggregated MTA-STS statistics across the domains of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedScan {
    pub time: DateTime<Utc>,
    pub source: ScanSource,
    pub attempted: usize,
    pub with_mxs: usize,
    pub mta_sts_testing: usize,
    pub mta_sts_testing_list: Vec<String>,
    pub mta_sts_enforce: usize,
    pub mta_sts_enforce_list: Vec<String>,
}

impl AggregatedScan {
    /// Start an empty aggregation stamped with the current time.
    pub fn new(source: ScanSource) -> Self {
        Self::at(source, Utc::now())
    }

    pub fn at(source: ScanSource, time: DateTime<Utc>) -> Self {
        Self {
            time,
            source,
            attempted: 0,
            with_mxs: 0,
            mta_sts_testing: 0,
            mta_sts_testing_list: Vec::new(),
            mta_sts_enforce: 0,
            mta_sts_enforce_list: Vec::new(),
        }
    }

    /// Number of domains with a policy in testing or enforce mode.
    pub fn total_mta_sts(&self) -> usize {
        self.mta_sts_testing + self.mta_sts_enforce
    }

    /// Share of domains with MXs that publish an MTA-STS policy, as a
    /// percentage between 0 and 100. Zero when no domain had MXs.
    pub fn percent_mta_sts(&self) -> f64 {
        if self.with_mxs == 0 {
            return 0.0;
        }
        100.0 * self.total_mta_sts() as f64 / self.with_mxs as f64
    }

    /// Serializable view including the derived totals.
    pub fn summary(&self) -> ScanSummary<'_> {
        ScanSummary {
            scan: self,
            total_mta_sts: self.total_mta_sts(),
            percent_mta_sts: self.percent_mta_sts(),
        }
    }

    fn log_progress(&self) {
        tracing::info!(
            attempted = self.attempted,
            with_mxs = self.with_mxs,
            testing = self.mta_sts_testing,
            enforce = self.mta_sts_enforce,
            "scan progress"
        );
        tracing::info!(domains = ?self.mta_sts_testing_list, "mta-sts testing");
        tracing::info!(domains = ?self.mta_sts_enforce_list, "mta-sts enforce");
    }
}

impl ResultHandler for AggregatedScan {
    fn handle_domain(&mut self, result: &DomainResult) {
        self.attempted += 1;
        if self.attempted % PROGRESS_INTERVAL == 0 {
            self.log_progress();
        }

        // No MX records: not an email domain.
        if !result.has_mail_hosts() {
            return;
        }
        self.with_mxs += 1;

        if let Some(mta_sts) = &result.mta_sts_result {
            match mta_sts.mode {
                MtaStsMode::Enforce => {
                    self.mta_sts_enforce += 1;
                    self.mta_sts_enforce_list.push(result.domain.clone());
                }
                MtaStsMode::Testing => {
                    self.mta_sts_testing += 1;
                    self.mta_sts_testing_list.push(result.domain.clone());
                }
                MtaStsMode::None | MtaStsMode::Unknown => {}
            }
        }
    }
}

impl fmt::Display for AggregatedScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scan at {}: attempted={} with_mxs={} testing={} enforce={} ({:.2}%)",
            self.source,
            self.time.to_rfc3339(),
            self.attempted,
            self.with_mxs,
            self.mta_sts_testing,
            self.mta_sts_enforce,
            self.percent_mta_sts()
        )
    }
}

/// JSON summary of an [`AggregatedScan`].
#[derive(Debug, Serialize)]
pub struct ScanSummary<'a> {
    #[serde(flatten)]
    pub scan: &'a AggregatedScan,
    pub total_mta_sts: usize,
    pub percent_mta_sts: f64,
}
