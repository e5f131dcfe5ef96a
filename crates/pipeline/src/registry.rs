//! Stage registration and dependency resolution.
//!
//! The registry owns every registered stage, keyed by name. Resolution is a
//! round-based topological sort: each round admits every stage whose whole
//! dependency set is already ordered, in lexicographic name order so the
//! resulting sequence is deterministic. Downstream chaining is strictly
//! linear, so that determinism is load-bearing, not cosmetic.

use std::collections::BTreeMap;

use tracing::info;

use crate::errors::PipelineError;
use crate::identifiers::StageName;
use crate::stage::StageModule;

// ---------------------------------------------------------------------------

/// A dependency-respecting stage sequence.
///
/// Derived data: produced by [`StageRegistry::resolve`], recomputed whenever
/// the stage set changes, never persisted. For every stage in the sequence,
/// all of its dependencies appear earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOrder(Vec<StageName>);

impl ExecutionOrder {
    /// The ordered stage names.
    pub fn as_slice(&self) -> &[StageName] {
        &self.0
    }

    /// Iterates the ordered stage names.
    pub fn iter(&self) -> std::slice::Iter<'_, StageName> {
        self.0.iter()
    }

    /// Number of stages in the order.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the order contains no stages.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------

/// Owns registered stages and derives their execution order.
#[derive(Default)]
pub struct StageRegistry {
    stages: BTreeMap<StageName, Box<dyn StageModule>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage under its own name.
    ///
    /// Re-registering an existing name replaces the previous stage.
    pub fn register(&mut self, stage: Box<dyn StageModule>) {
        let name = stage.name();
        info!(stage = %name, "loading stage");
        if self.stages.insert(name.clone(), stage).is_some() {
            info!(stage = %name, "replaced previously registered stage");
        }
    }

    /// Looks up a registered stage by name.
    pub fn get(&self, name: &StageName) -> Option<&dyn StageModule> {
        self.stages.get(name).map(Box::as_ref)
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stages are registered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Derives the execution order for the current stage set.
    ///
    /// Fails with [`PipelineError::UnknownDependency`] if any stage names a
    /// dependency that was never registered, and with
    /// [`PipelineError::CyclicDependency`] if a resolution round makes no
    /// progress while stages remain.
    pub fn resolve(&self) -> Result<ExecutionOrder, PipelineError> {
        // Unknown names would otherwise leave their dependents waiting on a
        // dependency that can never be satisfied; fail fast instead.
        for (name, stage) in &self.stages {
            let missing: Vec<String> = stage
                .dependencies()
                .iter()
                .filter(|dep| !self.stages.contains_key(dep))
                .map(|dep| dep.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(PipelineError::UnknownDependency {
                    stage: name.to_string(),
                    missing,
                });
            }
        }

        let mut ordered: Vec<StageName> = Vec::with_capacity(self.stages.len());
        let mut remaining: BTreeMap<&StageName, Vec<StageName>> = self
            .stages
            .iter()
            .map(|(name, stage)| (name, stage.dependencies()))
            .collect();

        while !remaining.is_empty() {
            // BTreeMap iteration keeps each round lexicographic by name.
            let ready: Vec<StageName> = remaining
                .iter()
                .filter(|(_, deps)| deps.iter().all(|dep| ordered.contains(dep)))
                .map(|(name, _)| (*name).clone())
                .collect();

            if ready.is_empty() {
                return Err(PipelineError::CyclicDependency {
                    remaining: remaining.keys().map(|name| name.to_string()).collect(),
                });
            }

            for name in ready {
                remaining.remove(&name);
                ordered.push(name);
            }
        }

        Ok(ExecutionOrder(ordered))
    }
}
