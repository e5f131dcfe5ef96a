//! Project-structure templating stage.
//!
//! Loads the architecture template for the detected language and the job's
//! target architecture, asks the LLM for a fresh "Proposed Project Structure"
//! section, and splices it into the generated requirements. A missing template
//! is not a failure — the stage simply leaves the requirements untouched.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use pipeline::context::keys;
use pipeline::{
    FileReader, GenerateOptions, GraphBuilder, LlmError, LlmProvider, PipelineStep, RunContext,
    StageModule, StageName, StepError, StepId,
};

use crate::{detector, requirements};

/// Registered name of this stage.
pub const NAME: &str = "project_structure";

const STRUCTURE_HEADING: &str = "## Proposed Project Structure";

const SYSTEM_PROMPT: &str = "\
You are an expert software architect. Your task is to update the project requirements \
document by replacing the \"Proposed Project Structure\" section with a new one based on \
the provided template.

INSTRUCTIONS:
1. Find the \"## Proposed Project Structure\" or \"## Project Structure\" section in the requirements
2. Replace ONLY this section with the new structure
3. Keep all other content exactly as is
4. The new structure should be based on the provided template but adapted to the project
5. Maintain consistent markdown formatting

The template is just an example - adapt it intelligently to fit the project's requirements.";

/// Splices a templated project structure into the requirements document.
pub struct ProjectStructure {
    reader: Arc<dyn FileReader>,
    llm: Arc<dyn LlmProvider>,
    templates_dir: PathBuf,
}

impl ProjectStructure {
    pub fn new(
        reader: Arc<dyn FileReader>,
        llm: Arc<dyn LlmProvider>,
        templates_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reader,
            llm,
            templates_dir: templates_dir.into(),
        }
    }
}

impl StageModule for ProjectStructure {
    fn name(&self) -> StageName {
        StageName::new(NAME)
    }

    fn dependencies(&self) -> Vec<StageName> {
        vec![
            StageName::new(detector::NAME),
            StageName::new(requirements::NAME),
        ]
    }

    fn contribute(&self, builder: &mut GraphBuilder) -> (StepId, StepId) {
        let step = TemplateStep {
            reader: Arc::clone(&self.reader),
            llm: Arc::clone(&self.llm),
            templates_dir: self.templates_dir.clone(),
        };
        let id = builder.add_step(self.name(), Arc::new(step));
        (id, id)
    }
}

struct TemplateStep {
    reader: Arc<dyn FileReader>,
    llm: Arc<dyn LlmProvider>,
    templates_dir: PathBuf,
}

impl TemplateStep {
    fn generate_structure(
        &self,
        requirements: &str,
        template: &str,
    ) -> Result<String, LlmError> {
        let user_prompt = format!(
            "Based on the following project requirements and template, generate a new \
             \"Proposed Project Structure\" section in markdown format. The structure should \
             be based on the template but adapted to this project.\n\n\
             Focus on creating a clean, well-organized structure that follows the template's \
             organization but is tailored to this project's needs.\n\n\
             Requirements (first 4000 chars):\n{}\n\n\
             Template Structure:\n{template}\n\n\
             Return ONLY the updated \"Proposed Project Structure\" section, including the \
             header and code block.",
            truncate_chars(requirements, 4000)
        );
        let options = GenerateOptions {
            max_tokens: 64_000,
            temperature: 0.0,
        };
        let (section, usage) = self.llm.generate(SYSTEM_PROMPT, &user_prompt, &options)?;
        debug!(%usage, "structure call finished");
        Ok(section)
    }
}

impl PipelineStep for TemplateStep {
    fn run(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        let language = ctx
            .get_str(keys::TARGET_LANGUAGE)
            .ok_or_else(|| StepError::new("target language not detected"))?
            .to_owned();
        let architecture = ctx.target_architecture().to_lowercase();

        let template_path = self
            .templates_dir
            .join(&language)
            .join(format!("{architecture}.txt"));
        let template = self.reader.read_file(&template_path);
        if template.is_empty() {
            info!(
                %language,
                %architecture,
                "no architecture template found, leaving project structure unchanged"
            );
            return Ok(());
        }

        let requirements = ctx
            .get_str(keys::GENERATED_REQUIREMENTS)
            .unwrap_or_default()
            .to_owned();
        let updated = match self.generate_structure(&requirements, &template) {
            Ok(section) => splice_structure(&requirements, &section),
            Err(err) => {
                // The template itself is still a usable structure proposal.
                warn!(error = %err, "structure generation failed, falling back to the raw template");
                template
            }
        };

        ctx.insert(keys::UPDATED_REQUIREMENTS, json!(updated));
        info!("updated requirements with templated project structure");
        Ok(())
    }
}

/// Replaces the proposed-structure section of `requirements` with `structure`,
/// or inserts one before the first heading when the section is absent.
fn splice_structure(requirements: &str, structure: &str) -> String {
    let structure = structure.trim();
    if let Some((before, rest)) = requirements.split_once(STRUCTURE_HEADING) {
        let after = match rest.split_once("\n## ") {
            Some((_, tail)) => format!("## {tail}"),
            None => String::new(),
        };
        format!("{before}{STRUCTURE_HEADING}\n\n{structure}\n\n{after}")
            .trim()
            .to_owned()
    } else if let Some((before, rest)) = requirements.split_once("##") {
        format!("{before}\n\n{STRUCTURE_HEADING}\n\n{structure}\n\n##{rest}")
            .trim()
            .to_owned()
    } else {
        format!("{requirements}\n\n{STRUCTURE_HEADING}\n\n{structure}")
            .trim()
            .to_owned()
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
