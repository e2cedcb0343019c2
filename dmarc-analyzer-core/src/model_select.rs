//! Resolving which model a run uses: stored default first, otherwise ask.
//!
//! The menu is written to `prompt_out` (stderr in the binary) and answers are read
//! line by line from `input`, so tests can drive it with in-memory buffers.

use crate::contract::InferenceClient;
use crate::error::{AnalyzerError, Result};
use crate::model_config::ModelConfigStore;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Returns the model to use for this run.
///
/// Uses the stored default when it is still installed. Otherwise lists the
/// installed models, reads a 1-based choice (or `q`), and offers to store the
/// choice as the new default.
pub async fn resolve_default<C, R, W>(
    client: &C,
    store: &ModelConfigStore,
    input: &mut R,
    prompt_out: &mut W,
) -> Result<String>
where
    C: InferenceClient + ?Sized,
    R: BufRead,
    W: Write,
{
    let stored = store.load().default_model;
    let models = client.list_models().await?;
    if models.is_empty() {
        return Err(AnalyzerError::NoModels);
    }

    if let Some(model) = stored.as_deref() {
        if models.iter().any(|m| m == model) {
            info!(model, "Using default model");
            return Ok(model.to_string());
        }
        warn!(model, "Stored default model is no longer installed");
    }

    let selected = select_interactively(&models, input, prompt_out)?;

    let answer = ask(
        input,
        prompt_out,
        &format!("Set '{selected}' as default for future runs? (y/n): "),
    )?;
    if answer.is_some_and(|a| a.eq_ignore_ascii_case("y")) {
        if let Err(e) = store.set_default_model(&selected) {
            warn!(error = %e, "Could not save default model");
            let _ = writeln!(prompt_out, "Warning: could not save config: {e}");
        }
    }

    Ok(selected)
}

fn select_interactively<R, W>(models: &[String], input: &mut R, prompt_out: &mut W) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    let echo = |e: std::io::Error| AnalyzerError::io("<terminal>", e);

    writeln!(prompt_out, "Available models:").map_err(echo)?;
    for (i, model) in models.iter().enumerate() {
        writeln!(prompt_out, "  {}. {}", i + 1, model).map_err(echo)?;
    }

    loop {
        let question = format!("\nSelect a model (1-{}) or 'q' to quit: ", models.len());
        let Some(answer) = ask(input, prompt_out, &question)? else {
            return Err(AnalyzerError::SelectionAborted);
        };
        if answer.eq_ignore_ascii_case("q") {
            return Err(AnalyzerError::SelectionAborted);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=models.len()).contains(&n) => return Ok(models[n - 1].clone()),
            Ok(_) => {
                writeln!(prompt_out, "Please enter a number between 1 and {}", models.len())
                    .map_err(echo)?;
            }
            Err(_) => writeln!(prompt_out, "Please enter a valid number").map_err(echo)?,
        }
    }
}

/// Prints `question` and reads one trimmed line. `None` means end of input.
fn ask<R, W>(input: &mut R, prompt_out: &mut W, question: &str) -> Result<Option<String>>
where
    R: BufRead,
    W: Write,
{
    let terminal = |e: std::io::Error| AnalyzerError::io("<terminal>", e);
    write!(prompt_out, "{question}").map_err(terminal)?;
    prompt_out.flush().map_err(terminal)?;

    let mut line = String::new();
    let read = input.read_line(&mut line).map_err(terminal)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
