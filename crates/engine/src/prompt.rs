// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step prompt assembly
//!
//! A dispatched prompt is: persona prelude, the rendered exec source, a
//! contract section describing required outputs and available injected
//! artifacts, and (on retries) the previous attempt's validation errors.
//! Substituted values are opaque text; schema content passes through the
//! sanitizer before it may appear here.

use crate::artifact::{InjectedArtifact, ARTIFACT_DIR};
use crate::contract::ContractValidator;
use crate::error::EngineError;
use crate::sanitize::{scrub_schema_for_prompt, SCHEMA_PROMPT_BYTE_LIMIT};
use std::fmt::Write as _;
use std::path::Path;
use wave_manifest::{ArtifactSource, ContractKind, ExecType, PersonaDef, Step, TemplateContext};

/// Render the step's exec source with placeholders substituted.
///
/// Inline `source` wins; otherwise `file` is read relative to the project
/// root. Slash commands dispatch their source verbatim (after substitution).
pub fn render_exec_source(
    step: &Step,
    project_root: &Path,
    ctx: &TemplateContext,
) -> Result<String, EngineError> {
    let raw = match (&step.exec.source, &step.exec.file) {
        (Some(source), _) => source.clone(),
        (None, Some(file)) => {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                project_root.join(file)
            };
            std::fs::read_to_string(&path).map_err(|e| EngineError::Prompt {
                step: step.id.to_string(),
                detail: format!("failed to read exec source {}: {e}", path.display()),
            })?
        }
        (None, None) => {
            return Err(EngineError::Prompt {
                step: step.id.to_string(),
                detail: "exec has neither source nor file".to_string(),
            })
        }
    };
    let rendered = ctx.render(&raw);
    Ok(match step.exec.exec_type {
        ExecType::SlashCommand if !rendered.starts_with('/') => format!("/{rendered}"),
        _ => rendered,
    })
}

/// Assemble the full prompt for one adapter invocation.
pub fn build_prompt(
    step: &Step,
    persona: &PersonaDef,
    ctx: &TemplateContext,
    injected: &[InjectedArtifact],
    validator: &ContractValidator,
    project_root: &Path,
    feedback: Option<&str>,
) -> Result<String, EngineError> {
    let mut prompt = String::new();

    if let Some(prelude) = &persona.prompt_prelude {
        prompt.push_str(prelude);
        prompt.push_str("\n\n");
    }

    prompt.push_str(&render_exec_source(step, project_root, ctx)?);

    let requirements = output_requirements(step, injected, validator)?;
    if !requirements.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&requirements);
    }

    if let Some(errors) = feedback {
        // Infallible for String.
        let _ = write!(
            prompt,
            "\n\nThe previous attempt failed output validation:\n{errors}\n\
             Fix the output so it satisfies the requirements above."
        );
    }

    Ok(prompt)
}

/// The contract section: declared outputs, the validation rule, and the
/// injected artifacts available under `.wave/artifacts/`.
fn output_requirements(
    step: &Step,
    injected: &[InjectedArtifact],
    validator: &ContractValidator,
) -> Result<String, EngineError> {
    let mut section = String::new();

    if !step.output_artifacts.is_empty() {
        section.push_str("## Required outputs\n");
        for artifact in &step.output_artifacts {
            let requirement = if artifact.required { "required" } else { "optional" };
            let origin = match artifact.source {
                ArtifactSource::File => "write the file",
                ArtifactSource::Stdout => "print to stdout; it is captured",
            };
            let _ = writeln!(
                section,
                "- {} at `{}` ({requirement}; {origin})",
                artifact.name,
                artifact.path.display()
            );
        }
    }

    if let Some(contract) = step.contract() {
        match contract.kind {
            ContractKind::JsonSchema => {
                if let Some(schema) = validator.schema_text(step, contract)? {
                    match scrub_schema_for_prompt(&schema, SCHEMA_PROMPT_BYTE_LIMIT) {
                        Some(scrubbed) => {
                            let _ = write!(
                                section,
                                "\nThe output must validate against this JSON schema:\n\
                                 ```json\n{scrubbed}\n```\n"
                            );
                        }
                        None => {
                            section.push_str(
                                "\nThe output must validate against the step's JSON schema \
                                 (omitted here for size).\n",
                            );
                        }
                    }
                }
            }
            ContractKind::Command => {
                if let Some(command) = &contract.command {
                    let _ = write!(
                        section,
                        "\nThe output is checked by running `{command}`; it must exit zero.\n"
                    );
                }
            }
        }
    }

    if !injected.is_empty() {
        section.push_str("\n## Available input artifacts\n");
        for artifact in injected {
            let _ = writeln!(
                section,
                "- `{ARTIFACT_DIR}/{}` (from step {})",
                artifact.local_name, artifact.source_step
            );
        }
    }

    Ok(section)
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
