//! The stage contract.
//!
//! A stage is one named, independently developed unit of processing with
//! declared dependencies. Stages never call each other: each contributes its
//! processing step(s) to a [`GraphBuilder`] and exposes only its boundary — an
//! `(entry, exit)` pair of step ids — which the compiler wires into one linear
//! chain.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::RunContext;
use crate::errors::StepError;
use crate::identifiers::{StageName, StepId};

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One processing step over the shared run context.
///
/// A step signals failure by returning `Err`; the execution engine records it
/// on the context and keeps going. Steps must leave the context usable for
/// later stages even when they fail.
pub trait PipelineStep: Send + Sync {
    /// Processes the context in place.
    fn run(&self, ctx: &mut RunContext) -> Result<(), StepError>;
}

impl<F> PipelineStep for F
where
    F: Fn(&mut RunContext) -> Result<(), StepError> + Send + Sync,
{
    fn run(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        self(ctx)
    }
}

// ---------------------------------------------------------------------------
// Stage contract
// ---------------------------------------------------------------------------

/// A registrable processing stage.
///
/// Registered with a [`crate::StageRegistry`] under [`StageModule::name`];
/// ordered by [`StageModule::dependencies`]; materialised into steps via
/// [`StageModule::contribute`].
pub trait StageModule: Send + Sync {
    /// The unique name this stage registers under.
    fn name(&self) -> StageName;

    /// Names of the stages that must run before this one. Order is
    /// irrelevant; unknown names fail resolution.
    fn dependencies(&self) -> Vec<StageName>;

    /// Registers this stage's step(s) with the builder and returns the
    /// stage's `(entry, exit)` boundary.
    ///
    /// A stage contributing several internal steps must connect them with
    /// [`GraphBuilder::connect`] so a single linear walk leads from its entry
    /// to its exit; entry and exit may be the same step.
    fn contribute(&self, builder: &mut GraphBuilder) -> (StepId, StepId);
}

// ---------------------------------------------------------------------------
// Graph builder
// ---------------------------------------------------------------------------

pub(crate) struct BuilderStep {
    pub(crate) stage: StageName,
    pub(crate) step: Arc<dyn PipelineStep>,
}

/// Accumulates steps and edges while stages contribute.
///
/// The builder itself imposes no shape; the compiler verifies afterwards that
/// the wired edges form one linear chain.
#[derive(Default)]
pub struct GraphBuilder {
    pub(crate) steps: Vec<BuilderStep>,
    pub(crate) edges: BTreeMap<usize, usize>,
}

impl GraphBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step owned by `stage` and returns its id.
    pub fn add_step(&mut self, stage: StageName, step: Arc<dyn PipelineStep>) -> StepId {
        let id = StepId::new(self.steps.len());
        self.steps.push(BuilderStep { stage, step });
        id
    }

    /// Wires an edge from one step to the next.
    ///
    /// Used by stages for their internal chains and by the compiler to join
    /// consecutive stages. A step's outgoing edge is replaced if wired twice.
    pub fn connect(&mut self, from: StepId, to: StepId) {
        self.edges.insert(from.index(), to.index());
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps have been registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
