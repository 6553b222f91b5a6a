//! starttls-check CLI Application
//!
//! Reads a CSV of domains, checks each one's MTA-STS policy and mail
//! exchangers on a worker pool, and reports MTA-STS adoption across the list.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use starttls_check_lib::{
    load_env_config, parse_timeout_string, resolve_scan_config, run_batch, AggregatedScan,
    ConfigManager, CsvIdentifiers, EnvConfig, FileConfig, JsonLinesPrinter, MailChecker, PoolSize,
    ScanConfig, ScanError, ScanSource,
};
use std::io;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for starttls-check
#[derive(Parser, Debug)]
#[command(name = "starttls-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scan a list of mail domains for MTA-STS and STARTTLS support")]
#[command(
    long_about = "Scan a CSV list of mail domains for MTA-STS and STARTTLS support.\n\nEach domain's MX records are looked up and its MTA-STS policy is fetched and validated. Every MX host is probed over SMTP, and adoption statistics are reported for the whole list."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// CSV file with domains (reads stdin if omitted or "-")
    #[arg(value_name = "FILE", help_heading = "Input")]
    pub file: Option<String>,

    /// Zero-based column holding the domain
    #[arg(short = 'c', long = "column", value_name = "N", help_heading = "Input")]
    pub column: Option<usize>,

    /// Treat the first row as a header
    #[arg(long = "headers", help_heading = "Input")]
    pub headers: bool,

    /// Label recorded on the summary (top-domains or local)
    #[arg(long = "source", value_name = "SOURCE", help_heading = "Input")]
    pub source: Option<ScanSource>,

    /// Number of parallel workers (default: 16)
    #[arg(short = 'p', long = "pool-size", value_name = "N", help_heading = "Performance")]
    pub pool_size: Option<String>,

    /// Network timeout per operation, e.g. "10s" or "1m"
    #[arg(short = 't', long = "timeout", value_name = "DURATION", help_heading = "Performance")]
    pub timeout: Option<String>,

    /// Print every domain result as a JSON line
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Print the aggregated summary as JSON
    #[arg(long = "summary-json", help_heading = "Output Format")]
    pub summary_json: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), ScanError> {
    let env_config = load_env_config(args.verbose);
    let file_config = load_file_config(&args, &env_config)?;
    let config = build_config(&args, &file_config, &env_config)?;
    tracing::debug!(?config, "resolved scan configuration");

    let output = file_config.output.clone().unwrap_or_default();
    let json = args.json || output.json.unwrap_or(false);
    let summary_json = args.summary_json || output.summary_json.unwrap_or(false);
    let structured = json || summary_json;

    let identifiers: Box<dyn Iterator<Item = Result<String, ScanError>> + Send> =
        match args.file.as_deref() {
            None | Some("-") => Box::new(CsvIdentifiers::from_reader(
                io::stdin(),
                config.column,
                config.has_headers,
            )),
            Some(path) => Box::new(CsvIdentifiers::from_path(
                path,
                config.column,
                config.has_headers,
            )?),
        };

    let checker = MailChecker::with_config(&config)?;
    let check = move |domain: String| {
        let checker = checker.clone();
        async move { checker.check_domain(&domain).await }
    };

    if !structured {
        ui::print_header(&config, args.file.as_deref());
    }
    let spinner = if structured {
        None
    } else {
        ui::Spinner::start(format!(
            "Scanning with {} workers...",
            config.pool_size.get()
        ))
    };

    let mut scan = AggregatedScan::new(config.source);
    let outcome = if json {
        let mut handler = (JsonLinesPrinter::new(io::stdout().lock()), &mut scan);
        run_batch(identifiers, check, &mut handler, config.pool_size).await
    } else {
        run_batch(identifiers, check, &mut scan, config.pool_size).await
    };

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }
    let stats = outcome?;
    tracing::info!(
        delivered = stats.delivered,
        elapsed = ?stats.elapsed,
        "scan finished"
    );

    if summary_json {
        println!("{}", serde_json::to_string_pretty(&scan.summary())?);
    } else if !json {
        ui::print_summary(&scan, &stats);
    }

    Ok(())
}

/// An explicit `--config` (or `SC_CONFIG`) must load; otherwise discover.
fn load_file_config(args: &Args, env_config: &EnvConfig) -> Result<FileConfig, ScanError> {
    let manager = ConfigManager::new(args.verbose);
    match args.config.as_ref().or(env_config.config.as_ref()) {
        Some(path) => manager.load_file(path),
        None => manager.discover_and_load(),
    }
}

/// Apply command-line flags over the file and environment configuration.
fn build_config(
    args: &Args,
    file_config: &FileConfig,
    env_config: &EnvConfig,
) -> Result<ScanConfig, ScanError> {
    let mut config = resolve_scan_config(file_config, env_config);

    if let Some(raw) = args.pool_size.as_deref() {
        config = config.with_pool_size(PoolSize::resolve(Some(raw)));
    }
    if let Some(column) = args.column {
        config = config.with_column(column);
    }
    if args.headers {
        config = config.with_headers(true);
    }
    if let Some(source) = args.source {
        config = config.with_source(source);
    }
    if let Some(timeout) = args.timeout.as_deref() {
        let secs = parse_timeout_string(timeout).ok_or_else(|| {
            ScanError::config(format!(
                "Invalid timeout '{}'. Use format like '5s', '30s', '2m'",
                timeout
            ))
        })?;
        config = config.with_timeout(Duration::from_secs(secs));
    }

    if config.timeout.is_zero() {
        return Err(ScanError::config("Timeout must be greater than zero"));
    }

    Ok(config)
}
