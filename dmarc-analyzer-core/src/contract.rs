//! # contract: interface to the language-model inference service
//!
//! The pipeline never talks HTTP itself. Everything it needs from the model
//! server is expressed by the [`InferenceClient`] trait:
//! - listing installed models, used when resolving which model to run;
//! - submitting a prompt for one model and collecting the whole response.
//!
//! The concrete Ollama client lives in the CLI crate. Tests use the generated
//! `MockInferenceClient`, exported under the default `test-export-mocks`
//! feature so downstream crates can script responses too.
//!
//! ## Error contract
//! - Connection failures and timeouts map to [`AnalyzerError::ServiceUnavailable`].
//! - Non-success HTTP statuses map to [`AnalyzerError::ServiceError`].
//!
//! Implementations must not retry.
//!
//! [`AnalyzerError::ServiceUnavailable`]: crate::error::AnalyzerError::ServiceUnavailable
//! [`AnalyzerError::ServiceError`]: crate::error::AnalyzerError::ServiceError

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::AnalyzerError;

/// Client for a locally hosted LLM inference service.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Names of the models installed on the service, sorted.
    async fn list_models(&self) -> Result<Vec<String>, AnalyzerError>;

    /// Runs `prompt` against `model` and returns the complete generated text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, AnalyzerError>;
}
