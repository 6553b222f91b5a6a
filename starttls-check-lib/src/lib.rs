//! # starttls-check Library
//!
//! Bulk evaluation of mail domains: run a check function over a list of
//! domains on a bounded worker pool, collect every result through a
//! pluggable handler, and summarise MTA-STS adoption across the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use starttls_check_lib::{run_batch, AggregatedScan, CsvIdentifiers, MailChecker, PoolSize, ScanSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = MailChecker::new()?;
//!     let domains = CsvIdentifiers::from_path("top-1m.csv", 1, false)?;
//!     let mut scan = AggregatedScan::new(ScanSource::TopDomains);
//!
//!     run_batch(
//!         domains,
//!         move |domain| {
//!             let checker = checker.clone();
//!             async move { checker.check_domain(&domain).await }
//!         },
//!         &mut scan,
//!         PoolSize::default(),
//!     )
//!     .await?;
//!
//!     println!("{:.2}% of mail domains publish MTA-STS", scan.percent_mta_sts());
//!     Ok(())
//! }
//! ```
//!
//! ## Pieces
//!
//! - **Result model**: [`CheckResult`] trees with a monotone [`Status`]
//! - **Pipeline**: [`run_batch`] / [`ScanPipeline`], N workers, completion barrier
//! - **Handlers**: [`ResultHandler`], [`AggregatedScan`], [`JsonLinesPrinter`]
//! - **Built-in check**: [`MailChecker`] (MX lookup, MTA-STS policy, SMTP probe)

pub use aggregate::{AggregatedScan, ScanSummary, PROGRESS_INTERVAL};
pub use checker::MailChecker;
pub use concurrent::{run_batch, BatchStats, ScanPipeline};
pub use config::{
    load_env_config, parse_timeout_string, resolve_scan_config, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig, OutputConfig, POOL_SIZE_ENV,
};
pub use error::ScanError;
pub use handler::{JsonLinesPrinter, ResultHandler};
pub use protocols::{DnsResolver, MxResolver};
pub use result::{checks, describe, CheckResult, Status};
pub use source::CsvIdentifiers;
pub use types::{
    DomainResult, MtaStsMode, MtaStsResult, PoolSize, ScanConfig, ScanSource, DEFAULT_POOL_SIZE,
    MAX_POOL_SIZE,
};
pub use utils::normalize_domain;

pub mod protocols;

mod aggregate;
mod checker;
mod concurrent;
mod config;
mod error;
mod handler;
mod result;
mod source;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScanError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
