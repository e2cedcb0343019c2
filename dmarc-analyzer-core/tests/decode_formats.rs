mod common;

use common::{write_gz, write_xml, write_zip, SAMPLE_REPORT};
use dmarc_analyzer_core::decode::decode_report_file;
use dmarc_analyzer_core::extract::parse_report;
use dmarc_analyzer_core::AnalyzerError;
use tempfile::tempdir;

#[test]
fn xml_gzip_and_zip_yield_the_same_report() {
    let dir = tempdir().unwrap();
    let plain = write_xml(dir.path(), "report.xml", SAMPLE_REPORT);
    let gz = write_gz(dir.path(), "report.xml.gz", SAMPLE_REPORT);
    let zip = write_zip(dir.path(), "report.zip", &[("report.xml", SAMPLE_REPORT)]);

    let from_plain = parse_report(&decode_report_file(&plain).unwrap()).unwrap();
    let from_gz = parse_report(&decode_report_file(&gz).unwrap()).unwrap();
    let from_zip = parse_report(&decode_report_file(&zip).unwrap()).unwrap();

    assert_eq!(from_plain, from_gz);
    assert_eq!(from_plain, from_zip);
}

#[test]
fn zip_prefers_the_xml_entry() {
    let dir = tempdir().unwrap();
    let zip = write_zip(
        dir.path(),
        "bundle.ZIP",
        &[("README.txt", "not a report"), ("example.com!1700000000.xml", SAMPLE_REPORT)],
    );
    assert_eq!(decode_report_file(&zip).unwrap(), SAMPLE_REPORT);
}

#[test]
fn txt_extension_is_rejected_before_parsing() {
    let dir = tempdir().unwrap();
    // Valid XML content: only the extension decides.
    let path = write_xml(dir.path(), "report.txt", SAMPLE_REPORT);
    match decode_report_file(&path) {
        Err(AnalyzerError::Format { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected format error, got {other:?}"),
    }
}

#[test]
fn corrupt_gzip_is_a_format_error_naming_the_file() {
    let dir = tempdir().unwrap();
    let path = write_xml(dir.path(), "broken.xml.gz", "definitely not gzip");
    let err = decode_report_file(&path).unwrap_err();
    assert!(matches!(err, AnalyzerError::Format { .. }));
    assert!(err.to_string().contains("broken.xml.gz"));
}

#[test]
fn corrupt_zip_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = write_xml(dir.path(), "broken.zip", "PK but not really");
    assert!(matches!(
        decode_report_file(&path),
        Err(AnalyzerError::Format { .. })
    ));
}

#[test]
fn empty_zip_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = write_zip(dir.path(), "empty.zip", &[]);
    assert!(matches!(
        decode_report_file(&path),
        Err(AnalyzerError::Format { .. })
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        decode_report_file(&dir.path().join("gone.xml")),
        Err(AnalyzerError::Io { .. })
    ));
}
