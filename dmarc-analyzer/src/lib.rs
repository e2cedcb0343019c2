#![doc = "dmarc-analyzer: command-line front end for dmarc-analyzer-core."]

//! Argument parsing, settings loading, the Ollama HTTP client and the terminal
//! prompts. Report handling itself lives in `dmarc-analyzer-core`.

pub mod cli;
pub mod load_config;
pub mod ollama;
pub mod prompt;
