//! Analysis client: renders a report into a prompt and asks the model about it.
//!
//! The prompt is a pure function of the [`Report`], so identical reports always
//! produce identical requests regardless of the container they arrived in.

use crate::contract::InferenceClient;
use crate::error::{AnalyzerError, Result};
use crate::report::{PolicyResult, Record, Report};
use crate::verdict::{AnalysisResult, VerdictClassifier};
use std::fmt::Write as _;
use tracing::{debug, info};

const INSTRUCTIONS: &str = "\
You are an email security analyst reviewing a DMARC aggregate report.
Look for SPF or DKIM authentication failures, spoofing attempts, unexpected or suspicious \
sending sources, high failure rates and any other anomaly that needs attention.
If nothing needs attention, reply with only the word \"ok\" (lowercase).
Otherwise reply with the concerns only, one per line, with no introduction or summary.";

/// Renders the deterministic textual summary sent to the model.
pub fn build_prompt(report: &Report) -> String {
    let meta = &report.metadata;
    let policy = &report.policy;
    let mut prompt = String::with_capacity(512 + report.records.len() * 160);

    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nDMARC report summary\n");

    let _ = write!(prompt, "Reporter: {}", meta.org_name);
    if let Some(email) = &meta.email {
        let _ = write!(prompt, " <{email}>");
    }
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Report ID: {}", meta.report_id);
    let _ = writeln!(
        prompt,
        "Period: {} to {}",
        fmt_timestamp(meta.date_range.begin_utc(), meta.date_range.begin),
        fmt_timestamp(meta.date_range.end_utc(), meta.date_range.end),
    );
    for error in &meta.errors {
        let _ = writeln!(prompt, "Reporter error: {error}");
    }

    let _ = write!(prompt, "Published policy: domain={} p={}", policy.domain, policy.p);
    if let Some(sp) = policy.sp {
        let _ = write!(prompt, " sp={sp}");
    }
    if let Some(adkim) = policy.adkim {
        let _ = write!(prompt, " adkim={adkim}");
    }
    if let Some(aspf) = policy.aspf {
        let _ = write!(prompt, " aspf={aspf}");
    }
    if let Some(pct) = policy.pct {
        let _ = write!(prompt, " pct={pct}");
    }
    if let Some(fo) = &policy.fo {
        let _ = write!(prompt, " fo={fo}");
    }
    let _ = writeln!(prompt);

    let dkim_failed: u64 = report
        .records
        .iter()
        .filter(|r| r.dkim == PolicyResult::Fail)
        .map(|r| r.count)
        .sum();
    let spf_failed: u64 = report
        .records
        .iter()
        .filter(|r| r.spf == PolicyResult::Fail)
        .map(|r| r.count)
        .sum();
    let dmarc_failed: u64 = report
        .records
        .iter()
        .filter(|r| r.fails_dmarc())
        .map(|r| r.count)
        .sum();
    let _ = writeln!(
        prompt,
        "Totals: {} records, {} messages, {} DKIM fail, {} SPF fail, {} failing both",
        report.records.len(),
        report.message_count(),
        dkim_failed,
        spf_failed,
        dmarc_failed,
    );

    if report.records.is_empty() {
        prompt.push_str("Records: none\n");
    } else {
        prompt.push_str("Records:\n");
        for (i, record) in report.records.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, describe_record(record));
        }
    }
    prompt
}

fn fmt_timestamp(utc: Option<chrono::DateTime<chrono::Utc>>, raw: i64) -> String {
    match utc {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => raw.to_string(),
    }
}

fn describe_record(record: &Record) -> String {
    let mut line = format!(
        "source_ip={} count={} disposition={} dkim={} spf={} header_from={}",
        record.source_ip,
        record.count,
        record.disposition,
        record.dkim,
        record.spf,
        record.header_from,
    );
    if let Some(from) = &record.envelope_from {
        let _ = write!(line, " envelope_from={from}");
    }
    if let Some(to) = &record.envelope_to {
        let _ = write!(line, " envelope_to={to}");
    }
    for reason in &record.reasons {
        let _ = write!(line, " override={}", reason.kind);
        if let Some(comment) = &reason.comment {
            let _ = write!(line, " ({comment})");
        }
    }
    for dkim in &record.auth_results.dkim {
        let _ = write!(line, " auth_dkim[domain={}", dkim.domain);
        if let Some(selector) = &dkim.selector {
            let _ = write!(line, " selector={selector}");
        }
        let _ = write!(line, " result={}]", dkim.result);
    }
    for spf in &record.auth_results.spf {
        let _ = write!(line, " auth_spf[domain={}", spf.domain);
        if let Some(scope) = &spf.scope {
            let _ = write!(line, " scope={scope}");
        }
        let _ = write!(line, " result={}]", spf.result);
    }
    line
}

/// Sends `report` to `model` and classifies the full response.
pub async fn analyze_report<C>(
    client: &C,
    model: &str,
    report: &Report,
    classifier: &dyn VerdictClassifier,
) -> Result<AnalysisResult>
where
    C: InferenceClient + ?Sized,
{
    let prompt = build_prompt(report);
    info!(
        model,
        report_id = %report.metadata.report_id,
        records = report.records.len(),
        "Analyzing report"
    );
    debug!(prompt_len = prompt.len(), "Prompt built");

    let response = client.generate(model, &prompt).await?;
    if response.trim().is_empty() {
        return Err(AnalyzerError::EmptyResponse);
    }

    let result = classifier.classify(&response);
    info!(
        has_concerns = result.has_concerns,
        concerns = result.concerns.len(),
        "Analysis complete"
    );
    Ok(result)
}
