//! The per-job analysis runner.
//!
//! Assembles the default stage set into a compiled pipeline once, then drives
//! one job at a time: context construction, engine run, and persistence of the
//! produced requirements documents. Implements [`pipeline::JobHandler`] so the
//! dispatcher never sees anything but the port.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, info_span};

use pipeline::context::keys;
use pipeline::{
    compile, engine, ExecutablePipeline, FileReader, JobHandler, JobMessage, LlmProvider,
    PipelineError, RunContext, StageName, StageRegistry,
};

use crate::{FrameworkDetector, ProjectStructure, RequirementGenerator};

/// Builds the default stage registry.
///
/// Registration order is deliberately irrelevant: the resolver orders stages
/// by their declared dependencies.
pub fn default_registry(
    reader: Arc<dyn FileReader>,
    llm: Arc<dyn LlmProvider>,
    templates_dir: impl Into<PathBuf>,
) -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry.register(Box::new(ProjectStructure::new(
        Arc::clone(&reader),
        Arc::clone(&llm),
        templates_dir,
    )));
    registry.register(Box::new(RequirementGenerator::new(
        Arc::clone(&reader),
        Arc::clone(&llm),
    )));
    registry.register(Box::new(FrameworkDetector::new(reader, llm)));
    registry
}

/// Runs the analysis pipeline for one job and persists its outputs.
pub struct AnalysisRunner {
    pipeline: ExecutablePipeline,
    output_dir: PathBuf,
}

impl AnalysisRunner {
    /// Assembles the default pipeline.
    ///
    /// Resolution and compilation happen here, once, so an invalid stage set
    /// aborts startup instead of failing every job.
    pub fn new(
        reader: Arc<dyn FileReader>,
        llm: Arc<dyn LlmProvider>,
        templates_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        let registry = default_registry(reader, llm, templates_dir);
        let order = registry.resolve()?;
        info!(order = ?order.as_slice(), "assembled analysis pipeline");
        let pipeline = compile(&order, &registry)?;
        Ok(Self {
            pipeline,
            output_dir: output_dir.into(),
        })
    }

    fn persist_outputs(&self, ctx: &mut RunContext) {
        const OUTPUTS: [(&str, &str); 2] = [
            (keys::GENERATED_REQUIREMENTS, "api_requirements.md"),
            (keys::UPDATED_REQUIREMENTS, "updated_requirements.md"),
        ];

        for (key, file_name) in OUTPUTS {
            let Some(content) = ctx.get_str(key) else {
                continue;
            };
            let content = content.to_owned();
            match write_output(&self.output_dir, file_name, &content) {
                Ok(()) => info!(file = %file_name, dir = %self.output_dir.display(), "saved requirements"),
                Err(err) => {
                    error!(file = %file_name, error = %err, "failed to save requirements");
                    ctx.record_error(
                        StageName::new("output_writer"),
                        format!("failed to write {file_name}: {err}"),
                    );
                }
            }
        }
    }
}

impl JobHandler for AnalysisRunner {
    fn handle(&self, job: &JobMessage) -> RunContext {
        let ctx = RunContext::for_job(job);
        let span = info_span!("job", id = %ctx.job_id());
        let _guard = span.enter();

        info!(
            contract = %ctx.contract_dir().display(),
            endpoints = %ctx.endpoints_dir().display(),
            "starting analysis"
        );
        let mut ctx = engine::run(&self.pipeline, ctx);
        info!(
            language = ctx.get_str(keys::TARGET_LANGUAGE).unwrap_or("unknown"),
            framework = ctx.get_str(keys::TARGET_FRAMEWORK).unwrap_or("unknown"),
            errors = ctx.errors().len(),
            "analysis complete"
        );
        for record in ctx.errors() {
            error!(stage = %record.stage, "{}", record.message);
        }

        self.persist_outputs(&mut ctx);
        ctx
    }
}

fn write_output(dir: &Path, file_name: &str, content: &str) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(file_name), content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubLlm, StubReader};
    use crate::{detector, requirements, structure};
    use serde_json::Map;

    fn job() -> JobMessage {
        JobMessage {
            bian_contract: "contract".into(),
            output: "work".into(),
            correlation: Map::new(),
        }
    }

    fn full_reader() -> StubReader {
        StubReader::new()
            .with_file("work/reqs/cards.md", "GET /cards implemented with Spring")
            .with_file(
                "contract/output/openapi.json",
                r#"{"openapi": "3.0.0", "paths": {"/cards": {}}}"#,
            )
            .with_file("templates/java/multimodule.txt", "api/\ncore/\ndomain/\n")
    }

    #[test]
    fn default_registry_resolves_to_the_expected_order() {
        let registry = default_registry(
            Arc::new(StubReader::new()),
            Arc::new(StubLlm::scripted(&[])),
            "templates",
        );
        let order = registry.resolve().expect("valid DAG");
        let names: Vec<_> = order.iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec![detector::NAME, requirements::NAME, structure::NAME]
        );
    }

    #[test]
    fn handle_runs_all_stages_and_persists_outputs() {
        let out_dir = tempfile::tempdir().expect("tempdir");
        let llm = StubLlm::scripted(&[
            "Language: Java\nFramework: Spring Boot",
            "# Requirements\n\n## Proposed Project Structure\nplaceholder\n\n## Endpoints\nGET /cards",
            "## Proposed Project Structure\n```\napi/\ncore/\n```",
        ]);
        let runner = AnalysisRunner::new(
            Arc::new(full_reader()),
            Arc::new(llm),
            "templates",
            out_dir.path(),
        )
        .expect("assembles");

        let ctx = runner.handle(&job());

        assert!(ctx.is_finished());
        assert!(ctx.errors().is_empty());
        assert_eq!(ctx.get_str(keys::TARGET_LANGUAGE), Some("java"));

        let generated = std::fs::read_to_string(out_dir.path().join("api_requirements.md"))
            .expect("generated requirements saved");
        assert!(generated.contains("# Requirements"));

        let updated = std::fs::read_to_string(out_dir.path().join("updated_requirements.md"))
            .expect("updated requirements saved");
        assert!(updated.contains("api/"));
        assert!(!updated.contains("placeholder"));
    }

    #[test]
    fn handle_with_missing_inputs_still_finishes_with_error_records() {
        let out_dir = tempfile::tempdir().expect("tempdir");
        let runner = AnalysisRunner::new(
            Arc::new(StubReader::new()),
            Arc::new(StubLlm::scripted(&[])),
            "templates",
            out_dir.path(),
        )
        .expect("assembles");

        let ctx = runner.handle(&job());

        assert!(ctx.is_finished());
        // Every stage failed, none aborted the run.
        assert_eq!(ctx.errors().len(), 3);
        assert_eq!(ctx.errors()[0].stage, StageName::new(detector::NAME));
        assert_eq!(ctx.errors()[1].stage, StageName::new(requirements::NAME));
        assert_eq!(ctx.errors()[2].stage, StageName::new(structure::NAME));
    }
}
