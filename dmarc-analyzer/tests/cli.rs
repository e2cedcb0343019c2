use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use serial_test::serial;
use std::fs::write;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feedback>
  <report_metadata>
    <org_name>google.com</org_name>
    <email>noreply-dmarc-support@google.com</email>
    <report_id>17811546231519583473</report_id>
    <date_range><begin>1700000000</begin><end>1700086399</end></date_range>
  </report_metadata>
  <policy_published>
    <domain>example.com</domain>
    <p>none</p>
  </policy_published>
  <record>
    <row>
      <source_ip>209.85.220.41</source_ip>
      <count>4</count>
      <policy_evaluated><disposition>none</disposition><dkim>pass</dkim><spf>pass</spf></policy_evaluated>
    </row>
    <identifiers><header_from>example.com</header_from></identifiers>
  </record>
</feedback>
"#;

/// Scratch directory holding a settings file, a model config naming `llama3:8b`,
/// and whatever report files a test adds.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(ollama_url: &str) -> Self {
        let dir = tempdir().expect("temp dir");
        let model_config = dir.path().join("model.json");
        write(&model_config, r#"{"default_model": "llama3:8b"}"#).unwrap();
        let settings = format!(
            "ollama_url: \"{ollama_url}\"\nmodel_config_path: \"{}\"\ninbox_dir: \"{}\"\narchive_processed: false\nrequest_timeout_secs: 10\n",
            model_config.display(),
            dir.path().join("inbox").display(),
        );
        write(dir.path().join("settings.yaml"), settings).unwrap();
        Self { dir }
    }

    fn settings(&self) -> PathBuf {
        self.dir.path().join("settings.yaml")
    }

    fn report(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        write(&path, content).unwrap();
        path
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

async fn ollama_answering(response: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:8b"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": response })))
        .mount(&server)
        .await;
    server
}

fn analyzer() -> Command {
    let mut cmd = Command::cargo_bin("dmarc-analyzer").expect("Binary exists");
    cmd.env_remove("OLLAMA_URL").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_the_options() {
    analyzer()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--ollama-url")
                .and(predicate::str::contains("--monitor"))
                .and(predicate::str::contains("--config")),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn clean_report_prints_ok() {
    let server = ollama_answering("ok").await;
    let ws = Workspace::new(&server.uri());
    let report = ws.report("google.xml", REPORT);

    analyzer()
        .arg("--config")
        .arg(ws.settings())
        .arg(&report)
        .assert()
        .success()
        .stdout("ok\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn concerns_are_printed_one_per_line() {
    let server = ollama_answering("- DKIM failures from 203.0.113.9\n- SPF softfail for bounce.example.net").await;
    let ws = Workspace::new(&server.uri());
    let report = ws.report("google.xml", REPORT);

    analyzer()
        .arg("--config")
        .arg(ws.settings())
        .arg(&report)
        .assert()
        .success()
        .stdout("DKIM failures from 203.0.113.9\nSPF softfail for bounce.example.net\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn one_bad_file_fails_the_run_but_not_the_others() {
    let server = ollama_answering("ok").await;
    let ws = Workspace::new(&server.uri());
    let first = ws.report("a.xml", REPORT);
    let broken = ws.report("b.xml", "<feedback><report_metadata>");
    let third = ws.report("c.xml", REPORT);

    analyzer()
        .arg("--config")
        .arg(ws.settings())
        .args([&first, &broken, &third])
        .assert()
        .code(1)
        .stdout("ok\nok\n")
        .stderr(predicate::str::contains("b.xml"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cli_url_overrides_settings_file() {
    let server = ollama_answering("ok").await;
    let ws = Workspace::new("http://127.0.0.1:9");
    let report = ws.report("google.xml", REPORT);

    analyzer()
        .arg("--config")
        .arg(ws.settings())
        .arg("--ollama-url")
        .arg(server.uri())
        .arg(&report)
        .assert()
        .success()
        .stdout("ok\n");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn ollama_url_is_read_from_the_environment() {
    let server = ollama_answering("ok").await;
    let ws = Workspace::new("http://127.0.0.1:9");
    let report = ws.report("google.xml", REPORT);

    analyzer()
        .env("OLLAMA_URL", server.uri())
        .arg("--config")
        .arg(ws.settings())
        .arg(&report)
        .assert()
        .success()
        .stdout("ok\n");
}

#[test]
fn unreachable_service_is_fatal() {
    let ws = Workspace::new("http://127.0.0.1:9");
    let report = ws.report("google.xml", REPORT);

    analyzer()
        .arg("--config")
        .arg(ws.settings())
        .arg(&report)
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("Error:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_inbox_is_fatal_in_monitor_mode() {
    let server = ollama_answering("ok").await;
    let ws = Workspace::new(&server.uri());

    analyzer()
        .arg("--config")
        .arg(ws.settings())
        .arg("--monitor")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("inbox"));
}

#[tokio::test(flavor = "multi_thread")]
async fn drained_inbox_exits_when_confirmation_gets_no_answer() {
    let server = ollama_answering("ok").await;
    let ws = Workspace::new(&server.uri());
    let inbox = ws.path().join("inbox");
    std::fs::create_dir(&inbox).unwrap();
    write(inbox.join("existing.xml"), REPORT).unwrap();

    analyzer()
        .arg("--config")
        .arg(ws.settings())
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout("ok\n")
        .stderr(predicate::str::contains("Continue monitoring"));
}

#[test]
fn invalid_settings_file_is_fatal() {
    let dir = tempdir().unwrap();
    let settings = dir.path().join("settings.yaml");
    write(&settings, "poll_interval_secs: soon\n").unwrap();

    analyzer()
        .arg("--config")
        .arg(&settings)
        .arg("whatever.xml")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config YAML"));
}
