///
/// This module implements the command-line interface for dmarc-analyzer: argument
/// parsing, wiring settings into the core pipeline, and choosing between file mode
/// and inbox-monitoring mode.
///
/// All report handling (decoding, extraction, analysis, verdicts, watching) lives in
/// [`dmarc-analyzer-core`]. This module only assembles the pieces and owns the
/// terminal: verdicts go to stdout, prompts and diagnostics to stderr.
///
/// ## How To Use
/// - Command line: `dmarc-analyzer --help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`dmarc-analyzer-core`]: ../../dmarc-analyzer-core/
use crate::load_config::{load_config, Settings};
use crate::ollama::OllamaClient;
use crate::prompt::confirm_monitoring;
use anyhow::{Context, Result};
use clap::Parser;
use dmarc_analyzer_core::model_config::ModelConfigStore;
use dmarc_analyzer_core::model_select::resolve_default;
use dmarc_analyzer_core::pipeline::{Pipeline, RunSummary};
use dmarc_analyzer_core::verdict::KeywordClassifier;
use dmarc_analyzer_core::watcher::{InboxWatcher, WatchConfig};
use std::io;
use std::path::PathBuf;

/// Analyse DMARC aggregate reports with a local Ollama model.
#[derive(Parser, Debug)]
#[clap(
    name = "dmarc-analyzer",
    version,
    about = "Analyse DMARC aggregate reports (.xml, .xml.gz, .zip) with a local Ollama model",
    long_about = "Analyse DMARC aggregate reports with a local Ollama model.\n\n\
        With file arguments, each report is analysed and the program exits. \
        Without arguments, reports already in the inbox directory are analysed \
        and the inbox is then monitored for new ones until interrupted."
)]
pub struct Cli {
    /// Base URL of the Ollama server
    #[clap(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Keep monitoring the inbox without asking first
    #[clap(long)]
    pub monitor: bool,

    /// Path to an optional YAML settings file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[clap(short, long)]
    pub verbose: bool,

    /// Report files to analyse; none means monitor the inbox
    pub files: Vec<PathBuf>,
}

/// Runs one invocation and returns what was processed.
///
/// Fatal problems (bad settings, unreachable service, no usable model, unusable
/// inbox) are errors. Per-file failures are recorded in the returned summary.
pub async fn run(cli: Cli) -> Result<RunSummary> {
    tracing::info!("trace_initialised");

    let mut settings = load_config(cli.config.as_ref())?;
    if let Some(url) = &cli.ollama_url {
        settings.ollama_url = url.clone();
    }

    let client = OllamaClient::new(&settings.ollama_url, settings.request_timeout)?;
    let store = ModelConfigStore::new(&settings.model_config_path);

    let model = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut stderr = io::stderr();
        resolve_default(&client, &store, &mut input, &mut stderr)
            .await
            .with_context(|| format!("Could not select a model from {}", client.base_url()))?
    };
    tracing::info!(model = %model, "Model resolved");

    let classifier = KeywordClassifier::new(settings.ok_markers.clone());
    let pipeline = Pipeline::new(client, model, Box::new(classifier))
        .with_archiving(settings.archive_processed);

    if cli.files.is_empty() {
        monitor_inbox(&pipeline, &settings, cli.monitor).await
    } else {
        tracing::info!(count = cli.files.len(), "Analysing files given on the command line");
        Ok(pipeline.run_files(&cli.files, &mut io::stdout()).await)
    }
}

async fn monitor_inbox(
    pipeline: &Pipeline<OllamaClient>,
    settings: &Settings,
    skip_confirmation: bool,
) -> Result<RunSummary> {
    let config = WatchConfig {
        inbox: settings.inbox_dir.clone(),
        poll_interval: settings.poll_interval,
        settle_delay: settings.settle_delay,
    };
    let mut watcher = InboxWatcher::open(config)
        .with_context(|| format!("Inbox {} is not usable", settings.inbox_dir.display()))?;

    let mut stdout = io::stdout();
    let mut summary = watcher.drain_existing(pipeline, &mut stdout).await?;

    if summary.total() > 0 && !skip_confirmation {
        watcher.await_confirmation();
        if !confirm_monitoring(watcher.inbox(), settings.monitor_prompt_timeout).await {
            tracing::info!("Not monitoring, exiting after existing reports");
            return Ok(summary);
        }
    }

    eprintln!(
        "Monitoring {} for new DMARC reports. Press Ctrl-C to stop.",
        watcher.inbox().display()
    );
    let watched = watcher.watch(pipeline, &mut stdout, shutdown_signal()).await?;
    summary.merge(watched);
    Ok(summary)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Interrupt received, shutting down");
            eprintln!("\nStopping monitor.");
        }
        Err(e) => {
            tracing::error!(error = %e, "Could not listen for Ctrl-C, monitoring until killed");
            std::future::pending::<()>().await;
        }
    }
}
