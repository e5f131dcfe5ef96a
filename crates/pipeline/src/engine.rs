//! The failure-tolerant execution engine.
//!
//! Walks a compiled pipeline strictly in order, feeding the shared context
//! through each step. A step failure is recorded on the context and execution
//! moves on: stages are written to tolerate missing upstream fields, so one
//! failing stage must not deny results from stages that do not depend on it.
//! The engine never infers which later stages are "safe" to skip — it only
//! guarantees it keeps moving and preserves every error.
//!
//! A run has exactly one terminal state: `Completed`. Even total failure of
//! every stage ends there, observable only through the non-empty error list.
//! There are no loops, branches, or retries here; a stage that needs retry
//! logic implements it internally.

use tracing::{debug, warn};

use crate::compile::ExecutablePipeline;
use crate::context::RunContext;

/// Runs the compiled pipeline over the given context and returns the finished
/// context.
pub fn run(pipeline: &ExecutablePipeline, mut ctx: RunContext) -> RunContext {
    for compiled in &pipeline.steps {
        ctx.set_current_stage(compiled.stage.clone());
        debug!(stage = %compiled.stage, "entering stage step");

        if let Err(err) = compiled.step.run(&mut ctx) {
            warn!(stage = %compiled.stage, error = %err, "stage step failed; continuing");
            ctx.record_error(compiled.stage.clone(), err.message());
        }
    }

    ctx.mark_finished();
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::errors::StepError;
    use crate::identifiers::{StageName, StepId};
    use crate::registry::StageRegistry;
    use crate::stage::{GraphBuilder, StageModule};
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        Fail(&'static str),
    }

    struct ScriptedStage {
        name: &'static str,
        deps: Vec<&'static str>,
        behaviour: Behaviour,
    }

    impl StageModule for ScriptedStage {
        fn name(&self) -> StageName {
            StageName::new(self.name)
        }

        fn dependencies(&self) -> Vec<StageName> {
            self.deps.iter().map(|d| StageName::new(*d)).collect()
        }

        fn contribute(&self, builder: &mut GraphBuilder) -> (StepId, StepId) {
            let name = self.name;
            let step = match self.behaviour {
                Behaviour::Succeed => Arc::new(
                    move |ctx: &mut RunContext| -> Result<(), StepError> {
                        ctx.insert(name, json!("ran"));
                        Ok(())
                    },
                ) as Arc<dyn crate::PipelineStep>,
                Behaviour::Fail(message) => Arc::new(
                    move |_: &mut RunContext| -> Result<(), StepError> {
                        Err(StepError::new(message))
                    },
                ),
            };
            let id = builder.add_step(self.name(), step);
            (id, id)
        }
    }

    fn pipeline_of(stages: Vec<ScriptedStage>) -> ExecutablePipeline {
        let mut registry = StageRegistry::new();
        for stage in stages {
            registry.register(Box::new(stage));
        }
        let order = registry.resolve().expect("valid DAG");
        compile(&order, &registry).expect("compiles")
    }

    #[test]
    fn a_failing_stage_does_not_abort_the_run() {
        let pipeline = pipeline_of(vec![
            ScriptedStage {
                name: "faulty",
                deps: vec![],
                behaviour: Behaviour::Fail("disk on fire"),
            },
            ScriptedStage {
                name: "independent",
                deps: vec!["faulty"],
                behaviour: Behaviour::Succeed,
            },
        ]);

        let out = run(&pipeline, RunContext::new("a", "b", "multimodule"));
        // The later stage still executed and contributed its result.
        assert_eq!(out.get_str("independent"), Some("ran"));
        assert_eq!(out.errors().len(), 1);
        assert_eq!(out.errors()[0].stage, StageName::new("faulty"));
        assert_eq!(out.errors()[0].message, "disk on fire");
        assert!(out.is_finished());
    }

    #[test]
    fn total_failure_still_completes_with_every_error_preserved() {
        let pipeline = pipeline_of(vec![
            ScriptedStage {
                name: "one",
                deps: vec![],
                behaviour: Behaviour::Fail("first"),
            },
            ScriptedStage {
                name: "two",
                deps: vec!["one"],
                behaviour: Behaviour::Fail("second"),
            },
        ]);

        let out = run(&pipeline, RunContext::new("a", "b", "multimodule"));
        assert!(out.is_finished());
        let messages: Vec<_> = out.errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn current_stage_marker_tracks_the_last_stage_entered() {
        let pipeline = pipeline_of(vec![
            ScriptedStage {
                name: "early",
                deps: vec![],
                behaviour: Behaviour::Succeed,
            },
            ScriptedStage {
                name: "late",
                deps: vec!["early"],
                behaviour: Behaviour::Succeed,
            },
        ]);

        let out = run(&pipeline, RunContext::new("a", "b", "multimodule"));
        assert_eq!(out.current_stage(), Some(&StageName::new("late")));
    }
}
