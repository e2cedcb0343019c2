//! Streaming extraction of the DMARC aggregate-report schema.
//!
//! The document is walked with `quick-xml` events while a stack of local element
//! names tracks the current position. Element text is collected into string
//! drafts first and validated once the enclosing block is complete, so schema
//! errors can name the exact element (e.g. `record[2]/row/count`).
//!
//! Unknown elements are skipped, namespace prefixes are ignored.

use crate::error::{AnalyzerError, Result};
use crate::report::{
    AuthResults, DateRange, DkimAuthResult, OverrideReason, PolicyPublished, Record, Report,
    ReportMetadata, SpfAuthResult,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::str::FromStr;
use tracing::debug;

/// Parses DMARC aggregate-report XML into a [`Report`].
pub fn parse_report(xml: &str) -> Result<Report> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut walker = Walker::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => walker.open(&String::from_utf8_lossy(e.local_name().as_ref()))?,
            Event::Empty(e) => {
                walker.open(&String::from_utf8_lossy(e.local_name().as_ref()))?;
                walker.close()?;
            }
            Event::End(_) => walker.close()?,
            Event::Text(t) => walker.text(&t.unescape()?),
            Event::CData(c) => walker.text(&String::from_utf8_lossy(&c.into_inner())),
            Event::Eof => break,
            _ => {}
        }
    }

    let report = walker.finish()?;
    debug!(
        org_name = %report.metadata.org_name,
        report_id = %report.metadata.report_id,
        records = report.records.len(),
        "Extracted DMARC report"
    );
    Ok(report)
}

#[derive(Default)]
struct Walker {
    stack: Vec<String>,
    text: String,
    saw_root: bool,
    meta: Option<MetaDraft>,
    policy: Option<PolicyDraft>,
    record: Option<RecordDraft>,
    records: Vec<Record>,
}

#[derive(Default)]
struct MetaDraft {
    org_name: Option<String>,
    email: Option<String>,
    report_id: Option<String>,
    begin: Option<String>,
    end: Option<String>,
    errors: Vec<String>,
}

#[derive(Default)]
struct PolicyDraft {
    domain: Option<String>,
    adkim: Option<String>,
    aspf: Option<String>,
    p: Option<String>,
    sp: Option<String>,
    pct: Option<String>,
    fo: Option<String>,
}

#[derive(Default)]
struct RecordDraft {
    source_ip: Option<String>,
    count: Option<String>,
    disposition: Option<String>,
    dkim: Option<String>,
    spf: Option<String>,
    reasons: Vec<ReasonDraft>,
    header_from: Option<String>,
    envelope_from: Option<String>,
    envelope_to: Option<String>,
    dkim_results: Vec<DkimDraft>,
    spf_results: Vec<SpfDraft>,
}

#[derive(Default)]
struct ReasonDraft {
    kind: Option<String>,
    comment: Option<String>,
}

#[derive(Default)]
struct DkimDraft {
    domain: Option<String>,
    selector: Option<String>,
    result: Option<String>,
}

#[derive(Default)]
struct SpfDraft {
    domain: Option<String>,
    scope: Option<String>,
    result: Option<String>,
}

fn set(slot: &mut Option<String>, value: String) {
    if !value.is_empty() {
        *slot = Some(value);
    }
}

impl Walker {
    fn open(&mut self, name: &str) -> Result<()> {
        if self.stack.is_empty() {
            if self.saw_root {
                return Err(AnalyzerError::Parse(format!(
                    "unexpected element <{name}> after the document root"
                )));
            }
            if name != "feedback" {
                return Err(AnalyzerError::Schema("feedback".to_string()));
            }
            self.saw_root = true;
        }
        self.stack.push(name.to_string());
        self.text.clear();

        let path: Vec<&str> = self.stack.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["feedback", "report_metadata"] => {
                self.meta.get_or_insert_with(MetaDraft::default);
            }
            ["feedback", "policy_published"] => {
                self.policy.get_or_insert_with(PolicyDraft::default);
            }
            ["feedback", "record"] => self.record = Some(RecordDraft::default()),
            ["feedback", "record", "row", "policy_evaluated", "reason"] => {
                if let Some(r) = self.record.as_mut() {
                    r.reasons.push(ReasonDraft::default());
                }
            }
            ["feedback", "record", "auth_results", "dkim"] => {
                if let Some(r) = self.record.as_mut() {
                    r.dkim_results.push(DkimDraft::default());
                }
            }
            ["feedback", "record", "auth_results", "spf"] => {
                if let Some(r) = self.record.as_mut() {
                    r.spf_results.push(SpfDraft::default());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, chunk: &str) {
        if !self.stack.is_empty() {
            self.text.push_str(chunk);
        }
    }

    fn close(&mut self) -> Result<()> {
        let value = std::mem::take(&mut self.text).trim().to_string();
        let path: Vec<&str> = self.stack.iter().map(String::as_str).collect();

        match path.as_slice() {
            ["feedback", "report_metadata", field @ ..] => {
                if let Some(m) = self.meta.as_mut() {
                    match field {
                        ["org_name"] => set(&mut m.org_name, value),
                        ["email"] => set(&mut m.email, value),
                        ["report_id"] => set(&mut m.report_id, value),
                        ["date_range", "begin"] => set(&mut m.begin, value),
                        ["date_range", "end"] => set(&mut m.end, value),
                        ["error"] if !value.is_empty() => m.errors.push(value),
                        _ => {}
                    }
                }
            }
            ["feedback", "policy_published", field] => {
                if let Some(p) = self.policy.as_mut() {
                    match *field {
                        "domain" => set(&mut p.domain, value),
                        "adkim" => set(&mut p.adkim, value),
                        "aspf" => set(&mut p.aspf, value),
                        "p" => set(&mut p.p, value),
                        "sp" => set(&mut p.sp, value),
                        "pct" => set(&mut p.pct, value),
                        "fo" => set(&mut p.fo, value),
                        _ => {}
                    }
                }
            }
            ["feedback", "record"] => {
                if let Some(draft) = self.record.take() {
                    let index = self.records.len();
                    self.records.push(draft_to_record(draft, index)?);
                }
            }
            ["feedback", "record", field @ ..] => {
                if let Some(r) = self.record.as_mut() {
                    match field {
                        ["row", "source_ip"] => set(&mut r.source_ip, value),
                        ["row", "count"] => set(&mut r.count, value),
                        ["row", "policy_evaluated", "disposition"] => {
                            set(&mut r.disposition, value)
                        }
                        ["row", "policy_evaluated", "dkim"] => set(&mut r.dkim, value),
                        ["row", "policy_evaluated", "spf"] => set(&mut r.spf, value),
                        ["row", "policy_evaluated", "reason", "type"] => {
                            if let Some(reason) = r.reasons.last_mut() {
                                set(&mut reason.kind, value);
                            }
                        }
                        ["row", "policy_evaluated", "reason", "comment"] => {
                            if let Some(reason) = r.reasons.last_mut() {
                                set(&mut reason.comment, value);
                            }
                        }
                        ["identifiers", "header_from"] => set(&mut r.header_from, value),
                        ["identifiers", "envelope_from"] => set(&mut r.envelope_from, value),
                        ["identifiers", "envelope_to"] => set(&mut r.envelope_to, value),
                        ["auth_results", "dkim", leaf] => {
                            if let Some(d) = r.dkim_results.last_mut() {
                                match *leaf {
                                    "domain" => set(&mut d.domain, value),
                                    "selector" => set(&mut d.selector, value),
                                    "result" => set(&mut d.result, value),
                                    _ => {}
                                }
                            }
                        }
                        ["auth_results", "spf", leaf] => {
                            if let Some(s) = r.spf_results.last_mut() {
                                match *leaf {
                                    "domain" => set(&mut s.domain, value),
                                    "scope" => set(&mut s.scope, value),
                                    "result" => set(&mut s.result, value),
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        self.stack.pop();
        Ok(())
    }

    fn finish(self) -> Result<Report> {
        if let Some(open) = self.stack.last() {
            return Err(AnalyzerError::Parse(format!(
                "unexpected end of document inside <{open}>"
            )));
        }
        if !self.saw_root {
            return Err(AnalyzerError::Parse("document has no root element".to_string()));
        }

        let meta = self
            .meta
            .ok_or_else(|| AnalyzerError::Schema("report_metadata".to_string()))?;
        let metadata = ReportMetadata {
            org_name: require(meta.org_name, "report_metadata/org_name")?,
            email: meta.email,
            report_id: require(meta.report_id, "report_metadata/report_id")?,
            date_range: DateRange {
                begin: parse_required(meta.begin, "report_metadata/date_range/begin")?,
                end: parse_required(meta.end, "report_metadata/date_range/end")?,
            },
            errors: meta.errors,
        };

        let policy = self
            .policy
            .ok_or_else(|| AnalyzerError::Schema("policy_published".to_string()))?;
        let pct: Option<u8> = parse_optional(policy.pct, "policy_published/pct")?;
        if pct.is_some_and(|pct| pct > 100) {
            return Err(AnalyzerError::Schema("policy_published/pct".to_string()));
        }
        let policy = PolicyPublished {
            domain: require(policy.domain, "policy_published/domain")?,
            adkim: parse_optional(policy.adkim, "policy_published/adkim")?,
            aspf: parse_optional(policy.aspf, "policy_published/aspf")?,
            p: parse_required(policy.p, "policy_published/p")?,
            sp: parse_optional(policy.sp, "policy_published/sp")?,
            pct,
            fo: policy.fo,
        };

        Ok(Report {
            metadata,
            policy,
            records: self.records,
        })
    }
}

fn draft_to_record(draft: RecordDraft, index: usize) -> Result<Record> {
    let at = |field: &str| format!("record[{index}]/{field}");

    let reasons = draft
        .reasons
        .into_iter()
        .map(|r| {
            Ok(OverrideReason {
                kind: require(r.kind, &at("row/policy_evaluated/reason/type"))?,
                comment: r.comment,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let dkim = draft
        .dkim_results
        .into_iter()
        .map(|d| {
            Ok(DkimAuthResult {
                domain: require(d.domain, &at("auth_results/dkim/domain"))?,
                selector: d.selector,
                result: require(d.result, &at("auth_results/dkim/result"))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let spf = draft
        .spf_results
        .into_iter()
        .map(|s| {
            Ok(SpfAuthResult {
                domain: require(s.domain, &at("auth_results/spf/domain"))?,
                scope: s.scope,
                result: require(s.result, &at("auth_results/spf/result"))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Record {
        source_ip: parse_required(draft.source_ip, &at("row/source_ip"))?,
        count: parse_required(draft.count, &at("row/count"))?,
        disposition: parse_required(draft.disposition, &at("row/policy_evaluated/disposition"))?,
        dkim: parse_required(draft.dkim, &at("row/policy_evaluated/dkim"))?,
        spf: parse_required(draft.spf, &at("row/policy_evaluated/spf"))?,
        reasons,
        header_from: require(draft.header_from, &at("identifiers/header_from"))?,
        envelope_from: draft.envelope_from,
        envelope_to: draft.envelope_to,
        auth_results: AuthResults { dkim, spf },
    })
}

fn require(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| AnalyzerError::Schema(field.to_string()))
}

fn parse_required<T: FromStr>(value: Option<String>, field: &str) -> Result<T> {
    let raw = require(value, field)?;
    raw.parse()
        .map_err(|_| AnalyzerError::Schema(format!("{field} (invalid value `{raw}`)")))
}

fn parse_optional<T: FromStr>(value: Option<String>, field: &str) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.parse()
                .map_err(|_| AnalyzerError::Schema(format!("{field} (invalid value `{raw}`)")))
        })
        .transpose()
}
