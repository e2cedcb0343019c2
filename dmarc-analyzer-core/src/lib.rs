#![doc = "dmarc-analyzer-core: core logic library for dmarc-analyzer."]

//! This crate holds the data model, report decoding, DMARC extraction, the
//! inference-service contract and the file/inbox pipelines. The concrete HTTP
//! client and all terminal glue live in the `dmarc-analyzer` binary crate.
//!
//! # Pipeline
//! `decode` → `extract` → `analysis` → `verdict`, orchestrated per file by
//! [`pipeline::Pipeline`] and, in monitoring mode, by [`watcher::InboxWatcher`].

pub mod analysis;
pub mod contract;
pub mod decode;
pub mod error;
pub mod extract;
pub mod model_config;
pub mod model_select;
pub mod pipeline;
pub mod report;
pub mod verdict;
pub mod watcher;

pub use error::{AnalyzerError, Result};
