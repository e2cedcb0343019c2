//! Inbox monitoring.
//!
//! [`InboxWatcher`] drains the reports already sitting in the inbox, then polls
//! the directory on a fixed interval and hands each new report file to the
//! [`Pipeline`]. The poll loop runs until the supplied shutdown future
//! resolves (Ctrl-C in the binary).
//!
//! State progression:
//! `Idle → DrainingExisting → AwaitingConfirmation → Watching ⇄ Processing → Stopped`.
//! The confirmation step is driven by the caller and may be skipped.

use crate::contract::InferenceClient;
use crate::decode::ReportFormat;
use crate::error::{AnalyzerError, Result};
use crate::pipeline::{Pipeline, RunSummary};
use std::collections::HashSet;
use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    DrainingExisting,
    AwaitingConfirmation,
    Watching,
    Processing(PathBuf),
    Stopped,
}

/// Shortest poll interval [`InboxWatcher::watch`] will use.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub inbox: PathBuf,
    /// Raised to [`MIN_POLL_INTERVAL`] when shorter.
    pub poll_interval: Duration,
    /// Pause before touching a newly seen file so the writer can finish.
    pub settle_delay: Duration,
}

impl WatchConfig {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
            poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_millis(500),
        }
    }
}

pub struct InboxWatcher {
    config: WatchConfig,
    seen: HashSet<PathBuf>,
    state: WatchState,
}

impl InboxWatcher {
    /// Fails when the inbox does not exist or is not a directory.
    pub fn open(config: WatchConfig) -> Result<Self> {
        let inbox = &config.inbox;
        let meta = fs::metadata(inbox).map_err(|e| AnalyzerError::io(inbox, e))?;
        if !meta.is_dir() {
            return Err(AnalyzerError::io(
                inbox,
                std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
            ));
        }
        Ok(Self {
            config,
            seen: HashSet::new(),
            state: WatchState::Idle,
        })
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn inbox(&self) -> &Path {
        &self.config.inbox
    }

    fn transition(&mut self, next: WatchState) {
        debug!(from = ?self.state, to = ?next, "[WATCH] State change");
        self.state = next;
    }

    /// Report files in the inbox not yet handed out, oldest first. Marks them as seen.
    ///
    /// Fails only when the directory itself cannot be listed; unreadable entries are skipped.
    pub fn take_new(&mut self) -> Result<Vec<PathBuf>> {
        let inbox = &self.config.inbox;
        let entries = fs::read_dir(inbox).map_err(|e| AnalyzerError::io(inbox, e))?;

        let mut fresh: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(inbox = %inbox.display(), error = %e, "[WATCH] Skipping unreadable inbox entry");
                    continue;
                }
            };
            let path = entry.path();
            if self.seen.contains(&path) || ReportFormat::from_path(&path).is_none() {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            fresh.push((modified, path));
        }

        fresh.sort();
        let paths: Vec<PathBuf> = fresh.into_iter().map(|(_, p)| p).collect();
        self.seen.extend(paths.iter().cloned());
        Ok(paths)
    }

    /// Processes every report already present in the inbox.
    pub async fn drain_existing<C, W>(&mut self, pipeline: &Pipeline<C>, out: &mut W) -> Result<RunSummary>
    where
        C: InferenceClient,
        W: Write,
    {
        self.transition(WatchState::DrainingExisting);
        let existing = self.take_new()?;
        if existing.is_empty() {
            info!(inbox = %self.config.inbox.display(), "No existing reports found in inbox");
        } else {
            info!(count = existing.len(), "Found existing reports to process");
        }
        Ok(pipeline.run_files(&existing, out).await)
    }

    /// Marks that the caller is asking whether to keep monitoring.
    pub fn await_confirmation(&mut self) {
        self.transition(WatchState::AwaitingConfirmation);
    }

    /// One polling step: processes any report that appeared since the last scan.
    pub async fn poll_once<C, W>(&mut self, pipeline: &Pipeline<C>, out: &mut W) -> Result<RunSummary>
    where
        C: InferenceClient,
        W: Write,
    {
        let mut summary = RunSummary::default();
        for path in self.take_new()? {
            info!(path = %path.display(), "[WATCH] New report detected");
            self.transition(WatchState::Processing(path.clone()));
            if !self.config.settle_delay.is_zero() {
                sleep(self.config.settle_delay).await;
            }
            summary.merge(pipeline.run_files(std::slice::from_ref(&path), out).await);
            self.transition(WatchState::Watching);
        }
        Ok(summary)
    }

    /// Polls the inbox until `shutdown` resolves, returning what was processed meanwhile.
    ///
    /// A failed scan is logged and retried on the next tick; only `shutdown` ends the loop.
    pub async fn watch<C, W, S>(&mut self, pipeline: &Pipeline<C>, out: &mut W, shutdown: S) -> Result<RunSummary>
    where
        C: InferenceClient,
        W: Write,
        S: Future<Output = ()>,
    {
        let period = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        self.transition(WatchState::Watching);
        info!(
            inbox = %self.config.inbox.display(),
            poll_interval_ms = period.as_millis() as u64,
            "[WATCH] Monitoring inbox for new DMARC reports"
        );

        let mut total = RunSummary::default();
        {
            let poll_loop = async {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    match self.poll_once(pipeline, out).await {
                        Ok(summary) => total.merge(summary),
                        Err(e) => warn!(error = %e, "[WATCH] Inbox scan failed, retrying on next tick"),
                    }
                }
            };
            tokio::select! {
                _ = poll_loop => {}
                _ = shutdown => {}
            }
        }

        self.transition(WatchState::Stopped);
        info!(
            succeeded = total.succeeded,
            failed = total.failed(),
            "[WATCH] Stopped monitoring"
        );
        Ok(total)
    }
}
