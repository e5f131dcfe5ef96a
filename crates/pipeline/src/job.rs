//! Wire-level job types and the job-handling port.
//!
//! A [`JobMessage`] is the unit consumed from the input queue. It is only ever
//! read: the dispatcher decodes it, hands it to a [`JobHandler`], and echoes
//! its correlation fields — plus derived result metadata — on the output
//! queue. Acknowledgment of the original delivery happens only after that
//! result has been durably published.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::context::{keys, RunContext};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------

/// One job descriptor as carried on the input queue.
///
/// Fields beyond the two input locations are correlation payload: opaque to
/// this system, echoed verbatim on the result message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    /// Directory of the published BIAN contract.
    #[serde(rename = "bianContract")]
    pub bian_contract: String,

    /// Working directory for this job's outputs.
    pub output: String,

    /// Any additional fields, preserved for the output message.
    #[serde(flatten)]
    pub correlation: Map<String, Value>,
}

// ---------------------------------------------------------------------------

/// Executes one job end-to-end: context construction, pipeline run, result
/// extraction.
///
/// Implementations run on a dedicated worker thread and may block for minutes;
/// they must never touch the broker connection. A handler is infallible by
/// contract — failures inside the run are recorded on the returned context,
/// never raised, so that every accepted job reaches an acknowledgment
/// decision.
pub trait JobHandler: Send + Sync + 'static {
    /// Runs the job and returns the finished context.
    fn handle(&self, job: &JobMessage) -> RunContext;
}

// ---------------------------------------------------------------------------

/// Builds the output-queue payload for a finished job.
///
/// The original message's fields are echoed verbatim; derived metadata is
/// nested under a `result` key so correlation fields can never be clobbered.
pub fn result_payload(job: &JobMessage, ctx: &RunContext) -> Value {
    let mut object = match serde_json::to_value(job) {
        Ok(Value::Object(map)) => map,
        // JobMessage always serialises to an object.
        _ => Map::new(),
    };
    object.insert(
        "result".to_owned(),
        json!({
            "jobId": ctx.job_id(),
            "language": ctx.get_str(keys::TARGET_LANGUAGE),
            "framework": ctx.get_str(keys::TARGET_FRAMEWORK),
            "errors": ctx.errors(),
            "finishedAt": Timestamp::now(),
        }),
    );
    Value::Object(object)
}
