//! In-memory model of a DMARC aggregate report (RFC 7489, Appendix C).
//!
//! A [`Report`] is built once by [`crate::extract::parse_report`] and is read-only
//! afterwards. Records keep the order of the `<record>` elements in the source XML.

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub policy: PolicyPublished,
    pub records: Vec<Record>,
}

impl Report {
    /// Total number of messages covered by all records.
    pub fn message_count(&self) -> u64 {
        self.records.iter().map(|r| r.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMetadata {
    pub org_name: String,
    pub email: Option<String>,
    pub report_id: String,
    pub date_range: DateRange,
    /// Free-form `<error>` entries supplied by the reporter.
    pub errors: Vec<String>,
}

/// Reporting window, in Unix seconds as carried by the XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub begin: i64,
    pub end: i64,
}

impl DateRange {
    pub fn begin_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.begin, 0)
    }

    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.end, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyPublished {
    pub domain: String,
    pub adkim: Option<Alignment>,
    pub aspf: Option<Alignment>,
    pub p: Disposition,
    pub sp: Option<Disposition>,
    pub pct: Option<u8>,
    pub fo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub source_ip: IpAddr,
    pub count: u64,
    pub disposition: Disposition,
    pub dkim: PolicyResult,
    pub spf: PolicyResult,
    pub reasons: Vec<OverrideReason>,
    pub header_from: String,
    pub envelope_from: Option<String>,
    pub envelope_to: Option<String>,
    pub auth_results: AuthResults,
}

impl Record {
    /// Both DMARC-evaluated mechanisms failed, so the message failed DMARC.
    pub fn fails_dmarc(&self) -> bool {
        self.dkim == PolicyResult::Fail && self.spf == PolicyResult::Fail
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideReason {
    pub kind: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResults {
    pub dkim: Vec<DkimAuthResult>,
    pub spf: Vec<SpfAuthResult>,
}

impl AuthResults {
    pub fn is_empty(&self) -> bool {
        self.dkim.is_empty() && self.spf.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimAuthResult {
    pub domain: String,
    pub selector: Option<String>,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpfAuthResult {
    pub domain: String,
    pub scope: Option<String>,
    pub result: String,
}

/// Policy action requested by the domain owner or applied by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    None,
    Quarantine,
    Reject,
}

impl FromStr for Disposition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Disposition::None),
            "quarantine" => Ok(Disposition::Quarantine),
            "reject" => Ok(Disposition::Reject),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Disposition::None => "none",
            Disposition::Quarantine => "quarantine",
            Disposition::Reject => "reject",
        })
    }
}

/// DKIM/SPF identifier alignment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Relaxed,
    Strict,
}

impl FromStr for Alignment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "r" => Ok(Alignment::Relaxed),
            "s" => Ok(Alignment::Strict),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Alignment::Relaxed => "relaxed",
            Alignment::Strict => "strict",
        })
    }
}

/// Aligned DKIM/SPF outcome as evaluated by the receiver's DMARC policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyResult {
    Pass,
    Fail,
}

impl FromStr for PolicyResult {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pass" => Ok(PolicyResult::Pass),
            "fail" => Ok(PolicyResult::Fail),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PolicyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyResult::Pass => "pass",
            PolicyResult::Fail => "fail",
        })
    }
}
