//! Turning free-form model output into a verdict, and printing it.

use regex::Regex;
use std::io::{self, Write};
use std::sync::OnceLock;

/// Output of one analysis: the raw model text and what the classifier made of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub text: String,
    pub has_concerns: bool,
    /// Concern lines in the order the model returned them. Empty when `has_concerns` is false.
    pub concerns: Vec<String>,
}

/// Decides whether a model response reports concerns.
pub trait VerdictClassifier: Send + Sync {
    fn classify(&self, response: &str) -> AnalysisResult;
}

/// Treats a response that is only an "ok" marker as clean; anything else is a list of concerns.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    ok_markers: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(["ok"])
    }
}

impl KeywordClassifier {
    pub fn new<I, S>(ok_markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ok_markers: ok_markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    fn is_ok_marker(&self, response: &str) -> bool {
        let normalized = response
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim()
            .to_lowercase();
        self.ok_markers.iter().any(|m| *m == normalized)
    }
}

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+").expect("static pattern compiles"))
}

impl VerdictClassifier for KeywordClassifier {
    fn classify(&self, response: &str) -> AnalysisResult {
        if self.is_ok_marker(response) {
            return AnalysisResult {
                text: response.to_string(),
                has_concerns: false,
                concerns: Vec::new(),
            };
        }

        let concerns: Vec<String> = response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| list_marker().replace(line, "").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        AnalysisResult {
            text: response.to_string(),
            has_concerns: !concerns.is_empty(),
            concerns,
        }
    }
}

/// Writes the verdict: a single `ok` line, or one line per concern.
pub fn present<W: Write>(result: &AnalysisResult, out: &mut W) -> io::Result<()> {
    if result.has_concerns {
        for concern in &result.concerns {
            writeln!(out, "{concern}")?;
        }
    } else {
        writeln!(out, "ok")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_marker_tolerates_case_quotes_and_period() {
        let classifier = KeywordClassifier::default();
        for response in ["ok", "OK", "  ok\n", "\"ok\"", "Ok."] {
            let result = classifier.classify(response);
            assert!(!result.has_concerns, "{response:?} should be clean");
            assert!(result.concerns.is_empty());
        }
    }

    #[test]
    fn list_markers_are_stripped() {
        let classifier = KeywordClassifier::default();
        let result = classifier.classify("- SPF fails for 10.0.0.1\n2) DKIM fails\n* note");
        assert_eq!(
            result.concerns,
            vec!["SPF fails for 10.0.0.1", "DKIM fails", "note"]
        );
    }

    #[test]
    fn custom_markers_replace_the_default() {
        let classifier = KeywordClassifier::new(["all clear"]);
        assert!(!classifier.classify("All clear").has_concerns);
        assert!(classifier.classify("ok").has_concerns);
    }
}
