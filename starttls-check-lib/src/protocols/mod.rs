//! Protocol implementations used by the built-in check function.

/// MX record lookup
pub mod dns;

/// MTA-STS policy retrieval over HTTPS
pub mod mta_sts;

/// Plain SMTP probing of mail exchangers
pub mod smtp;

pub use dns::{DnsResolver, MxResolver};
pub use mta_sts::{policy_url, validate_policy, MtaStsClient, MtaStsPolicy};
pub use smtp::SmtpProbe;
