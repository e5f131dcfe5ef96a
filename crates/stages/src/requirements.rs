//! Requirement synthesis stage.
//!
//! Merges every endpoint documentation file, loads the OpenAPI contract, and
//! asks the LLM to produce a comprehensive requirements document that
//! preserves the contract's endpoints, models, and error handling verbatim.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use pipeline::context::keys;
use pipeline::{
    FileReader, GenerateOptions, GraphBuilder, LlmProvider, PipelineStep, RunContext, StageModule,
    StageName, StepError, StepId,
};

use crate::detector;

/// Registered name of this stage.
pub const NAME: &str = "requirement_generator";

/// Language assumed when detection produced nothing.
const DEFAULT_LANGUAGE: &str = "Java";
/// Framework assumed when detection produced nothing.
const DEFAULT_FRAMEWORK: &str = "Spring Boot";

const SYSTEM_PROMPT: &str = "\
You are an expert software architect. Your task is to analyze the provided endpoint \
implementations and OpenAPI specification to generate comprehensive requirements for the \
API endpoints.

CRITICAL: You MUST preserve all endpoint names, request/response models, and error models \
exactly as defined in the OpenAPI specification.
CRITICAL: request and response models must be included into domain layer.

For each endpoint, include:
1. Endpoint path and HTTP method
2. Required headers and parameters
3. Request/response models with all fields and their types
4. Error responses and status codes
5. Any business rules or validations

Format the output in clear, well-structured markdown.";

/// Synthesises an API requirements document from endpoints and contract.
pub struct RequirementGenerator {
    reader: Arc<dyn FileReader>,
    llm: Arc<dyn LlmProvider>,
}

impl RequirementGenerator {
    pub fn new(reader: Arc<dyn FileReader>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { reader, llm }
    }
}

impl StageModule for RequirementGenerator {
    fn name(&self) -> StageName {
        StageName::new(NAME)
    }

    fn dependencies(&self) -> Vec<StageName> {
        vec![StageName::new(detector::NAME)]
    }

    fn contribute(&self, builder: &mut GraphBuilder) -> (StepId, StepId) {
        let step = SynthesiseStep {
            reader: Arc::clone(&self.reader),
            llm: Arc::clone(&self.llm),
        };
        let id = builder.add_step(self.name(), Arc::new(step));
        (id, id)
    }
}

struct SynthesiseStep {
    reader: Arc<dyn FileReader>,
    llm: Arc<dyn LlmProvider>,
}

impl PipelineStep for SynthesiseStep {
    fn run(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        info!("reading endpoint files");
        let endpoints = merge_endpoint_files(self.reader.as_ref(), ctx.endpoints_dir())?;

        info!("loading OpenAPI contract");
        let contract = load_contract(self.reader.as_ref(), ctx.contract_dir())?;
        let contract_pretty = serde_json::to_string_pretty(&contract)
            .map_err(|err| StepError::new(format!("failed to render contract: {err}")))?;

        let language = ctx
            .get_str(keys::TARGET_LANGUAGE)
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_owned();
        let framework = ctx
            .get_str(keys::TARGET_FRAMEWORK)
            .unwrap_or(DEFAULT_FRAMEWORK)
            .to_owned();

        let user_prompt = format!(
            "I need to generate requirements for a {framework} application in {language}.\n\n\
             Here are the endpoint implementations:\n{endpoints}\n\n\
             And here is the OpenAPI specification that must be strictly followed:\n\
             {contract_pretty}\n\n\
             Please generate comprehensive requirements for this API, ensuring all endpoints, \
             models, and error handling from the OpenAPI spec are preserved."
        );
        let options = GenerateOptions {
            max_tokens: 64_000,
            temperature: 0.0,
        };

        info!("generating requirements with LLM");
        let (requirements, usage) = self
            .llm
            .generate(SYSTEM_PROMPT, &user_prompt, &options)
            .map_err(|err| StepError::new(format!("requirement generation failed: {err}")))?;
        debug!(%usage, "synthesis call finished");

        ctx.insert(keys::GENERATED_REQUIREMENTS, json!(requirements));
        info!("successfully generated requirements");
        Ok(())
    }
}

/// Reads and merges all endpoint files, separated by labelled dividers.
fn merge_endpoint_files(reader: &dyn FileReader, dir: &Path) -> Result<String, StepError> {
    let names = reader.list_directory(dir);
    if names.is_empty() {
        return Err(StepError::new(format!(
            "no endpoint files found in {}",
            dir.display()
        )));
    }

    let divider = "=".repeat(80);
    let mut sections = Vec::with_capacity(names.len());
    for name in names {
        let content = reader.read_file(&dir.join(&name));
        if content.is_empty() {
            warn!(file = %name, "skipping empty or unreadable endpoint file");
            continue;
        }
        sections.push(format!("\n{divider}\nFile: {name}\n{divider}\n{content}"));
    }

    if sections.is_empty() {
        return Err(StepError::new(format!(
            "no readable endpoint files in {}",
            dir.display()
        )));
    }
    Ok(sections.join("\n"))
}

/// Loads the first JSON document from the contract directory.
fn load_contract(reader: &dyn FileReader, dir: &Path) -> Result<Value, StepError> {
    let name = reader
        .list_directory(dir)
        .into_iter()
        .find(|n| n.ends_with(".json"))
        .ok_or_else(|| {
            StepError::new(format!("no JSON contract found in {}", dir.display()))
        })?;
    let content = reader.read_file(&dir.join(&name));
    serde_json::from_str(&content)
        .map_err(|err| StepError::new(format!("failed to parse contract {name}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubLlm, StubReader};

    fn context() -> RunContext {
        RunContext::new("contract", "endpoints", "multimodule")
    }

    fn reader_with_inputs() -> StubReader {
        StubReader::new()
            .with_file("endpoints/a_cards.md", "GET /cards returns cards")
            .with_file("endpoints/b_loans.md", "GET /loans returns loans")
            .with_file("contract/openapi.json", r#"{"openapi": "3.0.0", "paths": {}}"#)
    }

    #[test]
    fn merges_endpoints_and_contract_into_the_prompt() {
        let llm = Arc::new(StubLlm::scripted(&["## Requirements\nfine"]));
        let step = SynthesiseStep {
            reader: Arc::new(reader_with_inputs()),
            llm: Arc::clone(&llm) as Arc<dyn LlmProvider>,
        };

        let mut ctx = context();
        ctx.insert(keys::TARGET_LANGUAGE, json!("kotlin"));
        step.run(&mut ctx).expect("step succeeds");

        assert_eq!(
            ctx.get_str(keys::GENERATED_REQUIREMENTS),
            Some("## Requirements\nfine")
        );

        let prompts = llm.prompts.lock().expect("prompt log");
        let (_, user_prompt) = &prompts[0];
        // Files merged in sorted order, contract inlined, detected language used.
        assert!(user_prompt.contains("File: a_cards.md"));
        assert!(user_prompt.contains("File: b_loans.md"));
        assert!(user_prompt.find("a_cards.md") < user_prompt.find("b_loans.md"));
        assert!(user_prompt.contains("\"openapi\": \"3.0.0\""));
        assert!(user_prompt.contains("in kotlin"));
    }

    #[test]
    fn defaults_apply_when_detection_produced_nothing() {
        let llm = Arc::new(StubLlm::scripted(&["ok"]));
        let step = SynthesiseStep {
            reader: Arc::new(reader_with_inputs()),
            llm: Arc::clone(&llm) as Arc<dyn LlmProvider>,
        };

        let mut ctx = context();
        step.run(&mut ctx).expect("step succeeds");

        let prompts = llm.prompts.lock().expect("prompt log");
        assert!(prompts[0].1.contains("Spring Boot application in Java"));
    }

    #[test]
    fn missing_contract_is_a_stage_failure() {
        let reader = StubReader::new().with_file("endpoints/a.md", "something");
        let step = SynthesiseStep {
            reader: Arc::new(reader),
            llm: Arc::new(StubLlm::scripted(&["unused"])),
        };

        let mut ctx = context();
        let err = step.run(&mut ctx).expect_err("no contract");
        assert!(err.message().contains("no JSON contract"));
    }

    #[test]
    fn malformed_contract_is_a_stage_failure() {
        let reader = StubReader::new()
            .with_file("endpoints/a.md", "something")
            .with_file("contract/openapi.json", "{not json");
        let step = SynthesiseStep {
            reader: Arc::new(reader),
            llm: Arc::new(StubLlm::scripted(&["unused"])),
        };

        let mut ctx = context();
        let err = step.run(&mut ctx).expect_err("bad contract");
        assert!(err.message().contains("failed to parse contract"));
    }

    #[test]
    fn empty_endpoint_directory_is_a_stage_failure() {
        let step = SynthesiseStep {
            reader: Arc::new(StubReader::new()),
            llm: Arc::new(StubLlm::scripted(&["unused"])),
        };

        let mut ctx = context();
        let err = step.run(&mut ctx).expect_err("no endpoints");
        assert!(err.message().contains("no endpoint files"));
    }
}
