// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template placeholder interpolation
//!
//! Prompts and exec sources use `{{ name }}` / `{{ namespace.name }}`
//! placeholders. Substitution is a single regex pass: substituted values are
//! opaque text and are never re-scanned, so a value containing `{{ ... }}`
//! cannot introduce new placeholders. Unknown placeholders are left as-is.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for {{ variable_name }} or {{ namespace.variable_name }}
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
pub static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\s*\}\}")
        .expect("constant regex pattern is valid")
});

/// Variable map for interpolation, with namespaced insertion helpers.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a top-level variable like `input` or `task`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Set a `pipeline_context.<name>` variable.
    pub fn set_pipeline_context(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.vars
            .insert(format!("pipeline_context.{}", name.into()), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Render a template against this context.
    pub fn render(&self, template: &str) -> String {
        interpolate(template, &self.vars)
    }
}

/// Interpolate `{{ name }}` placeholders with values from the vars map.
///
/// Unknown placeholders are left untouched.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            match vars.get(name) {
                Some(val) => val.clone(),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
