//! The per-job mutable run context.
//!
//! One [`RunContext`] exists per accepted job. It is built from the job
//! message, moved into the worker that runs the pipeline, threaded mutably
//! through every step, and finally read out to build the result payload. It is
//! never shared across jobs and never shared across threads except by that
//! single-ownership handoff.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::identifiers::{JobId, StageName};
use crate::job::JobMessage;

/// Architecture used when the job does not specify one.
pub const DEFAULT_ARCHITECTURE: &str = "multimodule";

/// Well-known results-bag keys shared between stages and the result payload.
///
/// Stages may write any key they like; these are the ones with cross-stage
/// readers.
pub mod keys {
    /// Programming language detected from the endpoint documentation.
    pub const TARGET_LANGUAGE: &str = "target_language";
    /// Web framework detected from the endpoint documentation.
    pub const TARGET_FRAMEWORK: &str = "target_framework";
    /// Requirements document synthesised from endpoints + contract.
    pub const GENERATED_REQUIREMENTS: &str = "generated_requirements";
    /// Requirements document with the templated project structure spliced in.
    pub const UPDATED_REQUIREMENTS: &str = "updated_requirements";
}

// ---------------------------------------------------------------------------

/// One recorded stage failure.
///
/// Error records are append-only data, not control flow: a non-empty error
/// list on a finished context is how partial success is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// The stage that failed.
    pub stage: StageName,
    /// Human-readable failure description.
    pub message: String,
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

// ---------------------------------------------------------------------------

/// The single shared mutable object threaded through a whole pipeline run.
///
/// Holds the fixed job inputs, an informational current-stage marker, an
/// append-only error list, and an open-ended results bag written by each stage
/// and readable by any later stage.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    job_id: JobId,
    current_stage: Option<StageName>,
    contract_dir: PathBuf,
    endpoints_dir: PathBuf,
    target_architecture: String,
    errors: Vec<ErrorRecord>,
    results: BTreeMap<String, Value>,
    finished: bool,
}

impl RunContext {
    /// Creates a context from explicit input locations.
    pub fn new(
        contract_dir: impl Into<PathBuf>,
        endpoints_dir: impl Into<PathBuf>,
        target_architecture: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new_random(),
            current_stage: None,
            contract_dir: contract_dir.into(),
            endpoints_dir: endpoints_dir.into(),
            target_architecture: target_architecture.into(),
            errors: Vec::new(),
            results: BTreeMap::new(),
            finished: false,
        }
    }

    /// Creates a context for an accepted job message.
    ///
    /// The contract directory is the `output/` subdirectory of the published
    /// contract location; endpoint documentation lives under the job's
    /// `reqs/` output subdirectory.
    pub fn for_job(job: &JobMessage) -> Self {
        Self::new(
            Path::new(&job.bian_contract).join("output"),
            Path::new(&job.output).join("reqs"),
            DEFAULT_ARCHITECTURE,
        )
    }

    /// The identifier assigned when this job was accepted.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Directory holding the OpenAPI contract document(s).
    pub fn contract_dir(&self) -> &Path {
        &self.contract_dir
    }

    /// Directory holding the existing endpoint documentation.
    pub fn endpoints_dir(&self) -> &Path {
        &self.endpoints_dir
    }

    /// The architecture style requested for structure templating.
    pub fn target_architecture(&self) -> &str {
        &self.target_architecture
    }

    /// The stage currently executing (informational; overwritten on each
    /// stage entry, retains the last stage's name after the run).
    pub fn current_stage(&self) -> Option<&StageName> {
        self.current_stage.as_ref()
    }

    pub(crate) fn set_current_stage(&mut self, stage: StageName) {
        self.current_stage = Some(stage);
    }

    /// Appends a failure record. Records are never removed or reordered.
    pub fn record_error(&mut self, stage: StageName, message: impl Into<String>) {
        self.errors.push(ErrorRecord {
            stage,
            message: message.into(),
        });
    }

    /// The failures accumulated so far, in the order they occurred.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Writes a value into the results bag, replacing any previous value
    /// under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.results.insert(key.into(), value);
    }

    /// Reads a value from the results bag.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.results.get(key)
    }

    /// Reads a string value from the results bag.
    ///
    /// Returns `None` when the key is absent or holds a non-string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.results.get(key).and_then(Value::as_str)
    }

    /// Marks the run as completed. This is the only terminal state; even a run
    /// in which every stage failed finishes here with a non-empty error list.
    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// Whether the run has reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn for_job_derives_input_locations() {
        let job = JobMessage {
            bian_contract: "contracts/cards".into(),
            output: "work/cards".into(),
            correlation: serde_json::Map::new(),
        };
        let ctx = RunContext::for_job(&job);
        assert_eq!(ctx.contract_dir(), Path::new("contracts/cards/output"));
        assert_eq!(ctx.endpoints_dir(), Path::new("work/cards/reqs"));
        assert_eq!(ctx.target_architecture(), DEFAULT_ARCHITECTURE);
        assert!(!ctx.is_finished());
    }

    #[test]
    fn results_bag_round_trips_values() {
        let mut ctx = RunContext::new("a", "b", "multimodule");
        ctx.insert("target_language", json!("java"));
        assert_eq!(ctx.get_str("target_language"), Some("java"));
        assert_eq!(ctx.get_str("missing"), None);

        ctx.insert("target_language", json!("kotlin"));
        assert_eq!(ctx.get_str("target_language"), Some("kotlin"));
    }

    #[test]
    fn error_records_append_in_order() {
        let mut ctx = RunContext::new("a", "b", "multimodule");
        ctx.record_error(StageName::new("first"), "boom");
        ctx.record_error(StageName::new("second"), "bang");
        let messages: Vec<_> = ctx.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["boom", "bang"]);
    }
}
