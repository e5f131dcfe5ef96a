//! Framework detection stage.
//!
//! Reads the first endpoint documentation file and asks the LLM to identify
//! the programming language and web framework it describes. The detected
//! values seed the rest of the pipeline; later stages fall back to sensible
//! defaults when detection fails.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use pipeline::context::keys;
use pipeline::{
    FileReader, GenerateOptions, GraphBuilder, LlmProvider, PipelineStep, RunContext, StageModule,
    StageName, StepError, StepId,
};

/// Registered name of this stage.
pub const NAME: &str = "framework_detector";

const SYSTEM_PROMPT: &str = "\
You are an expert software engineer analyzing code to identify the programming language \
and web framework used. Respond with ONLY the language and framework in this exact format:
\"Language: <language>\\nFramework: <framework>\"

If the framework is not a known web framework, just put 'None'.
Be concise and specific in your identification.";

/// Detects the target language and framework from endpoint documentation.
pub struct FrameworkDetector {
    reader: Arc<dyn FileReader>,
    llm: Arc<dyn LlmProvider>,
}

impl FrameworkDetector {
    pub fn new(reader: Arc<dyn FileReader>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { reader, llm }
    }
}

impl StageModule for FrameworkDetector {
    fn name(&self) -> StageName {
        StageName::new(NAME)
    }

    fn dependencies(&self) -> Vec<StageName> {
        Vec::new()
    }

    fn contribute(&self, builder: &mut GraphBuilder) -> (StepId, StepId) {
        let step = DetectStep {
            reader: Arc::clone(&self.reader),
            llm: Arc::clone(&self.llm),
        };
        let id = builder.add_step(self.name(), Arc::new(step));
        (id, id)
    }
}

struct DetectStep {
    reader: Arc<dyn FileReader>,
    llm: Arc<dyn LlmProvider>,
}

impl PipelineStep for DetectStep {
    fn run(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        let dir = ctx.endpoints_dir().to_path_buf();
        let file_name = first_markdown_file(self.reader.as_ref(), &dir).ok_or_else(|| {
            StepError::new(format!("no endpoint files found in {}", dir.display()))
        })?;
        info!(file = %file_name, "analysing endpoint file");

        let content = self.reader.read_file(&dir.join(&file_name));
        if content.is_empty() {
            return Err(StepError::new(format!(
                "endpoint file {file_name} is empty or unreadable"
            )));
        }

        let user_prompt = format!(
            "Analyze this code and identify the programming language and web framework:\n\n\
             {content}\n\n\
             Format your response as:\n\
             Language: <language>\n\
             Framework: <framework or None>"
        );
        let options = GenerateOptions {
            max_tokens: 5000,
            ..Default::default()
        };
        let (response, usage) = self
            .llm
            .generate(SYSTEM_PROMPT, &user_prompt, &options)
            .map_err(|err| StepError::new(format!("framework detection failed: {err}")))?;
        debug!(%usage, "detection call finished");

        let (language, framework) = parse_detection(&response);
        if let Some(language) = language {
            info!(%language, "detected language");
            ctx.insert(keys::TARGET_LANGUAGE, json!(language));
        }
        if let Some(framework) = framework {
            info!(%framework, "detected framework");
            ctx.insert(keys::TARGET_FRAMEWORK, json!(framework));
        }
        Ok(())
    }
}

fn first_markdown_file(reader: &dyn FileReader, dir: &Path) -> Option<String> {
    reader
        .list_directory(dir)
        .into_iter()
        .find(|name| name.ends_with(".md"))
}

/// Parses `Language: …` / `Framework: …` lines, case-insensitively.
///
/// `Framework: None` means no known web framework and yields no value.
fn parse_detection(response: &str) -> (Option<String>, Option<String>) {
    let mut language = None;
    let mut framework = None;
    for line in response.lines() {
        let line = line.trim();
        if let Some(value) = strip_label(line, "language:") {
            if !value.is_empty() {
                language = Some(value.to_lowercase());
            }
        } else if let Some(value) = strip_label(line, "framework:") {
            if !value.is_empty() && !value.eq_ignore_ascii_case("none") {
                framework = Some(value.to_lowercase());
            }
        }
    }
    (language, framework)
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let prefix = line.get(..label.len())?;
    if prefix.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubLlm, StubReader};
    use pipeline::compile;
    use pipeline::engine;
    use pipeline::StageRegistry;

    fn run_detector(reader: StubReader, llm: StubLlm) -> RunContext {
        let mut registry = StageRegistry::new();
        registry.register(Box::new(FrameworkDetector::new(
            Arc::new(reader),
            Arc::new(llm),
        )));
        let order = registry.resolve().expect("resolves");
        let compiled = compile(&order, &registry).expect("compiles");
        engine::run(
            &compiled,
            RunContext::new("contract", "endpoints", "multimodule"),
        )
    }

    #[test]
    fn stores_lowercased_language_and_framework() {
        let reader = StubReader::new().with_file("endpoints/cards.md", "GET /cards");
        let llm = StubLlm::scripted(&["Language: Java\nFramework: Spring Boot"]);
        let ctx = run_detector(reader, llm);

        assert!(ctx.errors().is_empty());
        assert_eq!(ctx.get_str(keys::TARGET_LANGUAGE), Some("java"));
        assert_eq!(ctx.get_str(keys::TARGET_FRAMEWORK), Some("spring boot"));
    }

    #[test]
    fn framework_none_is_treated_as_absent() {
        let reader = StubReader::new().with_file("endpoints/cli.md", "a console tool");
        let llm = StubLlm::scripted(&["Language: Rust\nFramework: None"]);
        let ctx = run_detector(reader, llm);

        assert_eq!(ctx.get_str(keys::TARGET_LANGUAGE), Some("rust"));
        assert_eq!(ctx.get_str(keys::TARGET_FRAMEWORK), None);
    }

    #[test]
    fn missing_endpoint_directory_records_a_stage_failure() {
        let ctx = run_detector(StubReader::new(), StubLlm::scripted(&[]));

        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].stage, StageName::new(NAME));
        assert!(ctx.errors()[0].message.contains("no endpoint files"));
        assert!(ctx.is_finished());
    }

    #[test]
    fn llm_failure_becomes_a_stage_failure() {
        let reader = StubReader::new().with_file("endpoints/cards.md", "GET /cards");
        let ctx = run_detector(reader, StubLlm::failing());

        assert_eq!(ctx.errors().len(), 1);
        assert!(ctx.errors()[0].message.contains("framework detection failed"));
    }

    #[test]
    fn parse_detection_ignores_unrelated_lines() {
        let (language, framework) = parse_detection(
            "Here is my analysis:\nLanguage: Python\nSomething else\nFramework: FastAPI\n",
        );
        assert_eq!(language.as_deref(), Some("python"));
        assert_eq!(framework.as_deref(), Some("fastapi"));
    }
}
