//! Check results and the severity lattice.
//!
//! A [`CheckResult`] is one node in a tree of checks. Each node carries a
//! [`Status`], a log of messages and its named sub-checks. A node's status is
//! always the most severe of everything reported on it directly and the
//! status of every child attached to it; it is updated eagerly on every
//! report and every attach, and it never goes down.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a check outcome, ordered `Success < Warning < Failure < Error`.
///
/// Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Status {
    #[default]
    Success = 0,
    Warning = 1,
    Failure = 2,
    Error = 3,
}

impl Status {
    /// Combine an existing status with a newly reported one.
    ///
    /// Returns `new` if it is strictly more severe than `self`, otherwise
    /// `self`. Every status-mutating operation goes through this.
    ///
    /// ```
    /// use starttls_check_lib::Status;
    ///
    /// assert_eq!(Status::Success.combine(Status::Warning), Status::Warning);
    /// assert_eq!(Status::Failure.combine(Status::Success), Status::Failure);
    /// ```
    pub fn combine(self, new: Status) -> Status {
        if new > self {
            new
        } else {
            self
        }
    }

    /// Numeric code used on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Human-readable name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "Success",
            Status::Warning => "Warning",
            Status::Failure => "Failure",
            Status::Error => "Error",
        }
    }
}

impl TryFrom<i32> for Status {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, String> {
        match code {
            0 => Ok(Status::Success),
            1 => Ok(Status::Warning),
            2 => Ok(Status::Failure),
            3 => Ok(Status::Error),
            other => Err(format!("invalid status code {}", other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Status::try_from(code).map_err(de::Error::custom)
    }
}

/// Identifiers of the checks the scanner knows how to describe.
pub mod checks {
    pub const CONNECTIVITY: &str = "connectivity";
    pub const STARTTLS: &str = "starttls";
    pub const VERSION: &str = "version";
    pub const CERTIFICATE: &str = "certificate";
    pub const MTA_STS: &str = "mta-sts";
    pub const MTA_STS_TEXT: &str = "mta-sts-text";
    pub const MTA_STS_POLICY_FILE: &str = "mta-sts-policy-file";
    pub const POLICY_LIST: &str = "policylist";
}

/// Full-text description of a well-known check. Unknown names map to `""`.
pub fn describe(name: &str) -> &'static str {
    match name {
        checks::CONNECTIVITY => "Server connectivity",
        checks::STARTTLS => "Support for inbound STARTTLS",
        checks::VERSION => "Secure version of TLS",
        checks::CERTIFICATE => "Valid certificate",
        checks::MTA_STS => "Inbound MTA-STS support",
        checks::MTA_STS_TEXT => "Correct MTA-STS DNS record",
        checks::MTA_STS_POLICY_FILE => "Correct MTA-STS policy file",
        checks::POLICY_LIST => "Status on EFF's STARTTLS Everywhere policy list",
        _ => "",
    }
}

/// Outcome of a single check and, recursively, its sub-checks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckResult {
    pub name: String,

    pub status: Status,

    /// Append-only log, one entry per reported event.
    #[serde(default)]
    pub messages: Vec<String>,

    /// Sub-checks keyed by their name. Each child is owned by this node only.
    #[serde(default)]
    pub checks: BTreeMap<String, CheckResult>,
}

impl CheckResult {
    /// Create an empty, successful result for the named check.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            status: Status::Success,
            messages: Vec::new(),
            checks: BTreeMap::new(),
        }
    }

    /// Record an error. Overrides any other status.
    pub fn error<M: fmt::Display>(&mut self, message: M) -> &mut Self {
        self.report(Status::Error, format!("Error: {}", message))
    }

    /// Record a failure. Overrides everything but `Error`.
    pub fn failure<M: fmt::Display>(&mut self, message: M) -> &mut Self {
        self.report(Status::Failure, format!("Failure: {}", message))
    }

    /// Record a warning. Only overrides `Success`.
    pub fn warning<M: fmt::Display>(&mut self, message: M) -> &mut Self {
        self.report(Status::Warning, format!("Warning: {}", message))
    }

    /// Mark the check successful. Has no visible effect unless nothing more
    /// severe was reported.
    pub fn success(&mut self) -> &mut Self {
        self.status = self.status.combine(Status::Success);
        self
    }

    /// Mark the check successful and keep `message` as an annotation.
    pub fn success_with<M: fmt::Display>(&mut self, message: M) -> &mut Self {
        self.report(Status::Success, message.to_string())
    }

    fn report(&mut self, level: Status, message: String) -> &mut Self {
        self.status = self.status.combine(level);
        self.messages.push(message);
        self
    }

    /// Attach `child` under its own name, replacing any previous child of the
    /// same name. The parent's status is escalated to the child's if more
    /// severe; replacing a child never lowers it.
    pub fn add_check(&mut self, child: CheckResult) -> &mut Self {
        self.status = self.status.combine(child.status);
        self.checks.insert(child.name.clone(), child);
        self
    }

    /// Whether the named sub-check has been attached and succeeded.
    /// Returns `false` if it has not run yet.
    pub fn subcheck_succeeded(&self, name: &str) -> bool {
        self.checks
            .get(name)
            .map(|child| child.status == Status::Success)
            .unwrap_or(false)
    }

    /// Look up a direct sub-check.
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.get(name)
    }

    pub fn status_text(&self) -> &'static str {
        self.status.as_str()
    }

    pub fn description(&self) -> &'static str {
        describe(&self.name)
    }
}

impl Serialize for CheckResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut len = 4;
        if !self.messages.is_empty() {
            len += 1;
        }
        if !self.checks.is_empty() {
            len += 1;
        }

        let mut state = serializer.serialize_struct("CheckResult", len)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("status_text", self.status_text())?;
        state.serialize_field("description", self.description())?;
        if self.messages.is_empty() {
            state.skip_field("messages")?;
        } else {
            state.serialize_field("messages", &self.messages)?;
        }
        if self.checks.is_empty() {
            state.skip_field("checks")?;
        } else {
            state.serialize_field("checks", &self.checks)?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [Status; 4] = [
        Status::Success,
        Status::Warning,
        Status::Failure,
        Status::Error,
    ];

    #[test]
    fn test_combine_examples() {
        assert_eq!(Status::Success.combine(Status::Warning), Status::Warning);
        assert_eq!(Status::Failure.combine(Status::Success), Status::Failure);
        assert_eq!(Status::Error.combine(Status::Error), Status::Error);
    }

    #[test]
    fn test_combine_is_max_associative_and_idempotent() {
        for a in ALL {
            assert_eq!(a.combine(a), a);
            for b in ALL {
                assert_eq!(a.combine(b), a.max(b));
                assert_eq!(a.combine(b), b.combine(a));
                for c in ALL {
                    assert_eq!(a.combine(b).combine(c), a.combine(b.combine(c)));
                }
            }
        }
    }

    #[test]
    fn test_reports_keep_most_severe() {
        let mut result = CheckResult::new("starttls");
        result.warning("weak cipher offered");
        assert_eq!(result.status, Status::Warning);
        result.error("connection reset");
        result.warning("another warning");
        result.failure("no STARTTLS");
        result.success();
        assert_eq!(result.status, Status::Error);
        assert_eq!(
            result.messages,
            vec![
                "Warning: weak cipher offered",
                "Error: connection reset",
                "Warning: another warning",
                "Failure: no STARTTLS",
            ]
        );
    }

    #[test]
    fn test_success_only_annotates() {
        let mut result = CheckResult::new("version");
        result.success();
        assert!(result.messages.is_empty());
        assert_eq!(result.status, Status::Success);

        result.success_with("TLSv1.3 negotiated");
        assert_eq!(result.messages, vec!["TLSv1.3 negotiated"]);
        assert_eq!(result.status, Status::Success);

        result.failure("TLSv1.0 accepted");
        result.success_with("ok after all");
        assert_eq!(result.status, Status::Failure);
    }

    #[test]
    fn test_add_check_escalates_without_downgrade() {
        let mut parent = CheckResult::new("mx.example.com");

        let mut bad = CheckResult::new(checks::CERTIFICATE);
        bad.error("expired");
        parent.add_check(bad);
        assert_eq!(parent.status, Status::Error);

        parent.add_check(CheckResult::new(checks::STARTTLS));
        assert_eq!(parent.status, Status::Error);

        // Replacing the failing child keeps the escalated status.
        parent.add_check(CheckResult::new(checks::CERTIFICATE));
        assert_eq!(parent.status, Status::Error);
        assert!(parent.subcheck_succeeded(checks::CERTIFICATE));
    }

    #[test]
    fn test_status_is_max_over_tree() {
        let mut leaf = CheckResult::new(checks::VERSION);
        leaf.warning("TLSv1.1 offered");
        let mut mid = CheckResult::new(checks::STARTTLS);
        mid.add_check(leaf);
        let mut root = CheckResult::new("example.com");
        root.add_check(mid);
        root.add_check(CheckResult::new(checks::CONNECTIVITY));
        assert_eq!(root.status, Status::Warning);
    }

    #[test]
    fn test_subcheck_succeeded() {
        let mut parent = CheckResult::new("host");
        assert!(!parent.subcheck_succeeded("x"));

        let mut x = CheckResult::new("x");
        x.warning("meh");
        parent.add_check(x);
        assert!(!parent.subcheck_succeeded("x"));

        parent.add_check(CheckResult::new("y"));
        assert!(parent.subcheck_succeeded("y"));
    }

    #[test]
    fn test_describe_catalogue() {
        assert_eq!(describe(checks::CONNECTIVITY), "Server connectivity");
        assert_eq!(
            describe(checks::MTA_STS_POLICY_FILE),
            "Correct MTA-STS policy file"
        );
        assert_eq!(
            describe(checks::POLICY_LIST),
            "Status on EFF's STARTTLS Everywhere policy list"
        );
        assert_eq!(describe("dane"), "");
    }

    #[test]
    fn test_serialize_omits_empty_fields() {
        let result = CheckResult::new(checks::STARTTLS);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "starttls",
                "status": 0,
                "status_text": "Success",
                "description": "Support for inbound STARTTLS",
            })
        );
    }

    #[test]
    fn test_serialize_nested() {
        let mut cert = CheckResult::new(checks::CERTIFICATE);
        cert.failure("name mismatch");
        let mut host = CheckResult::new("mx.example.com");
        host.add_check(cert);

        let value = serde_json::to_value(&host).unwrap();
        assert_eq!(value["status"], 2);
        assert_eq!(value["status_text"], "Failure");
        assert_eq!(value["description"], "");
        assert!(value.get("messages").is_none());
        let cert = &value["checks"]["certificate"];
        assert_eq!(cert["description"], "Valid certificate");
        assert_eq!(cert["messages"], json!(["Failure: name mismatch"]));
    }

    #[test]
    fn test_deserialize_ignores_derived_fields() {
        let mut original = CheckResult::new(checks::MTA_STS);
        original.warning("max_age is short");
        original.add_check(CheckResult::new(checks::MTA_STS_TEXT));

        let text = serde_json::to_string(&original).unwrap();
        let parsed: CheckResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_deserialize_rejects_unknown_status() {
        let parsed: Result<CheckResult, _> =
            serde_json::from_str(r#"{"name":"x","status":7}"#);
        assert!(parsed.is_err());
    }
}
