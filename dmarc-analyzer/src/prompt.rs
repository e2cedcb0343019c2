//! The "keep monitoring?" question asked after the inbox has been drained.
//!
//! Stdin is read on a blocking thread so the answer can be raced against a
//! timeout. An unanswered question counts as "no".

use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;
use tracing::{info, warn};

/// `y`/`yes` (any case) is a yes; everything else is a no.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Asks on stderr whether to continue monitoring `inbox`, reading the answer from stdin.
pub async fn confirm_monitoring(inbox: &std::path::Path, wait: Duration) -> bool {
    let question = format!(
        "\nContinue monitoring {} for new reports? (y/n, defaults to n in {}s): ",
        inbox.display(),
        wait.as_secs()
    );
    ask_with_timeout(&question, wait, read_stdin_line).await
}

fn read_stdin_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Prints `question` to stderr and waits up to `wait` for `read_line` to answer.
pub async fn ask_with_timeout<F>(question: &str, wait: Duration, read_line: F) -> bool
where
    F: FnOnce() -> io::Result<String> + Send + 'static,
{
    let mut stderr = io::stderr();
    let _ = write!(stderr, "{question}");
    let _ = stderr.flush();

    match timeout(wait, task::spawn_blocking(read_line)).await {
        Ok(Ok(Ok(answer))) => {
            let yes = is_yes(&answer);
            info!(answer = %answer.trim(), continue_monitoring = yes, "Monitoring confirmation answered");
            yes
        }
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "Could not read confirmation answer");
            false
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Confirmation reader task failed");
            false
        }
        Err(_) => {
            let _ = writeln!(stderr, "\nNo answer received, not monitoring.");
            info!(timeout_secs = wait.as_secs(), "Monitoring confirmation timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn answer_within_timeout_is_used() {
        let yes = ask_with_timeout("? ", Duration::from_secs(5), || Ok("y\n".to_string())).await;
        assert!(yes);
    }

    #[tokio::test]
    async fn timeout_means_no() {
        let yes = ask_with_timeout("? ", Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok("y\n".to_string())
        })
        .await;
        assert!(!yes);
    }

    #[tokio::test]
    async fn read_error_means_no() {
        let yes = ask_with_timeout("? ", Duration::from_secs(5), || {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "closed"))
        })
        .await;
        assert!(!yes);
    }
}
