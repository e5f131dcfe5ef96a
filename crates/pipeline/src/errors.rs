//! Pipeline assembly and step error types.
//!
//! [`PipelineError`] covers conditions that make a pipeline impossible to
//! assemble; they surface immediately to whoever builds the pipeline and abort
//! startup. [`StepError`] is the recoverable kind: a step failure is recorded
//! into the run context as data and execution continues.
//!
//! Infrastructure errors (broker failures, LLM transport failures) are defined
//! in their respective crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Assembly errors
// ---------------------------------------------------------------------------

/// Errors raised while resolving or compiling a stage set.
///
/// All variants are fatal: there is nothing to run, so the caller must abort
/// before accepting any job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// A round of dependency resolution made no progress while stages remain.
    ///
    /// Produced by: [`crate::StageRegistry::resolve`]. Names every stage still
    /// unordered; the cycle is somewhere among them.
    #[error("cyclic dependency among stages: {}", remaining.join(", "))]
    CyclicDependency {
        /// Names of the stages that could not be ordered.
        remaining: Vec<String>,
    },

    /// A stage declares a dependency on a name that was never registered.
    ///
    /// Resolution fails fast rather than leaving the stage waiting forever on
    /// a dependency that cannot be satisfied.
    #[error("stage '{stage}' depends on unregistered stage(s): {}", missing.join(", "))]
    UnknownDependency {
        /// The stage whose dependency list is invalid.
        stage: String,
        /// The declared dependency names with no matching registration.
        missing: Vec<String>,
    },

    /// The execution order names a stage the registry does not hold.
    ///
    /// Produced by: [`crate::compile`] when handed an order that was not
    /// derived from the same registry.
    #[error("execution order names unregistered stage '{stage}'")]
    UnregisteredStage {
        /// The offending stage name.
        stage: String,
    },

    /// A stage registered steps whose internal edges do not form a single
    /// linear chain from its entry to its exit.
    #[error("stage wiring is not a linear chain: {detail}")]
    MalformedGraph {
        /// Description of the wiring problem.
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Step errors
// ---------------------------------------------------------------------------

/// Failure of a single processing step.
///
/// Never propagates past the execution engine: the engine records it as an
/// [`crate::ErrorRecord`] on the run context and moves on to the next step.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{0}")]
pub struct StepError(String);

impl StepError {
    /// Creates a step error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self(message.to_owned())
    }
}
