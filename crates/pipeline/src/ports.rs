//! Infrastructure port traits.
//!
//! Stages consume external services exclusively through these traits; the
//! concrete adapters live in the `fsio` and `llm` crates. Both ports are
//! synchronous by design: stage code runs on a dedicated worker thread and is
//! allowed to block there.

use std::path::Path;

use thiserror::Error;

use crate::types::{GenerateOptions, TokenUsage};

// ---------------------------------------------------------------------------
// File access
// ---------------------------------------------------------------------------

/// Read-only file access with a degrade-don't-crash contract.
///
/// A missing or unreadable file yields an empty result rather than an error;
/// stages check for the content they need and record their own failure when it
/// is absent. This keeps a single bad file from aborting a whole run.
pub trait FileReader: Send + Sync {
    /// Returns the file's text content, or an empty string if it cannot be
    /// read.
    fn read_file(&self, path: &Path) -> String;

    /// Returns the sorted entry names of a directory, or an empty list if it
    /// cannot be listed.
    fn list_directory(&self, path: &Path) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// LLM generation
// ---------------------------------------------------------------------------

/// Errors surfaced by an [`LlmProvider`].
///
/// Always handled at the stage boundary: a generation failure becomes a stage
/// failure record, never a crash.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the API, where one was provided.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("LLM returned an unexpected response: {0}")]
    MalformedResponse(String),
}

/// A text-generation service.
///
/// One call per prompt; streaming is the adapter's concern — callers always
/// receive the fully assembled completion together with token accounting.
pub trait LlmProvider: Send + Sync {
    /// Generates a completion for the given system/user prompt pair.
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerateOptions,
    ) -> Result<(String, TokenUsage), LlmError>;
}
