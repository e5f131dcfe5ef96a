//! Linear pipeline compilation.
//!
//! Compilation turns an execution order plus the registry that produced it
//! into one executable step sequence: each stage contributes its steps to a
//! [`GraphBuilder`], the exit of each stage is wired to the entry of the next,
//! and the resulting chain is flattened by walking it from the first stage's
//! entry to the last stage's exit.
//!
//! Compiling an empty order is valid and yields the identity pipeline: running
//! it returns the input context unchanged.

use std::sync::Arc;

use crate::errors::PipelineError;
use crate::identifiers::StageName;
use crate::registry::{ExecutionOrder, StageRegistry};
use crate::stage::{GraphBuilder, PipelineStep};

// ---------------------------------------------------------------------------

/// One step of a compiled pipeline, labelled with its owning stage.
#[derive(Clone)]
pub(crate) struct CompiledStep {
    pub(crate) stage: StageName,
    pub(crate) step: Arc<dyn PipelineStep>,
}

/// A compiled, ready-to-run pipeline.
///
/// Immutable and shareable: compiled once at assembly time and reused for
/// every job, with a fresh context per run.
pub struct ExecutablePipeline {
    pub(crate) steps: Vec<CompiledStep>,
}

impl ExecutablePipeline {
    /// Number of steps in the compiled chain.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether this is the identity pipeline.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Stage names in step order (a stage with several steps appears once per
    /// step).
    pub fn stage_sequence(&self) -> Vec<StageName> {
        self.steps.iter().map(|s| s.stage.clone()).collect()
    }
}

// ---------------------------------------------------------------------------

/// Compiles an execution order against the registry that produced it.
///
/// The compiler only needs each stage's boundary identities; a stage may
/// register internal branching between its entry and exit as long as a single
/// linear walk connects the two.
pub fn compile(
    order: &ExecutionOrder,
    registry: &StageRegistry,
) -> Result<ExecutablePipeline, PipelineError> {
    let mut builder = GraphBuilder::new();
    let mut boundaries: Vec<(StageName, crate::StepId, crate::StepId)> =
        Vec::with_capacity(order.len());

    for name in order.iter() {
        let stage = registry
            .get(name)
            .ok_or_else(|| PipelineError::UnregisteredStage {
                stage: name.to_string(),
            })?;
        let (entry, exit) = stage.contribute(&mut builder);
        boundaries.push((name.clone(), entry, exit));
    }

    // Chain stage exits to the next stage's entry.
    for window in boundaries.windows(2) {
        let (_, _, exit) = &window[0];
        let (_, entry, _) = &window[1];
        builder.connect(*exit, *entry);
    }

    let (Some((_, entry, _)), Some((_, _, terminal))) = (boundaries.first(), boundaries.last())
    else {
        // Zero stages: identity pipeline.
        return Ok(ExecutablePipeline { steps: Vec::new() });
    };

    flatten(builder, *entry, *terminal)
}

/// Walks the wired chain from `entry` to `terminal`, collecting steps in
/// execution order.
fn flatten(
    builder: GraphBuilder,
    entry: crate::StepId,
    terminal: crate::StepId,
) -> Result<ExecutablePipeline, PipelineError> {
    let total = builder.steps.len();
    let mut steps = Vec::with_capacity(total);
    let mut cursor = entry;

    loop {
        if steps.len() >= total {
            return Err(PipelineError::MalformedGraph {
                detail: format!("walk exceeded {total} registered steps without reaching the exit"),
            });
        }
        let node = builder.steps.get(cursor.index()).ok_or_else(|| {
            PipelineError::MalformedGraph {
                detail: format!("{cursor} is not a registered step"),
            }
        })?;
        steps.push(CompiledStep {
            stage: node.stage.clone(),
            step: Arc::clone(&node.step),
        });

        if cursor == terminal {
            return Ok(ExecutablePipeline { steps });
        }
        cursor = match builder.edges.get(&cursor.index()) {
            Some(next) => crate::StepId::new(*next),
            None => {
                return Err(PipelineError::MalformedGraph {
                    detail: format!("chain breaks at {cursor}: no outgoing edge"),
                })
            }
        };
    }
}
