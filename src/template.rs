//! Template interpolation for source definitions
//!
//! Header and parameter values in a source YAML may contain
//! `{{ env.NAME }}` or `{{ vars.name }}` placeholders, so tokens and contact
//! addresses stay out of the definition file.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Regex for matching template variables: {{ scope.name }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(env|vars)\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .expect("template regex is valid")
});

/// Values available to templates
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    env: HashMap<String, String>,
    vars: HashMap<String, String>,
}

impl TemplateContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context over the process environment
    pub fn from_env() -> Self {
        Self {
            env: std::env::vars().collect(),
            vars: HashMap::new(),
        }
    }

    /// Set an environment value
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set a variable
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    fn lookup(&self, scope: &str, name: &str) -> Option<&String> {
        match scope {
            "env" => self.env.get(name),
            _ => self.vars.get(name),
        }
    }
}

/// Render a template string
///
/// Every placeholder must resolve; the error names all that do not.
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |caps: &regex::Captures<'_>| {
        match ctx.lookup(&caps[1], &caps[2]) {
            Some(value) => value.clone(),
            None => {
                missing.push(format!("{}.{}", &caps[1], &caps[2]));
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::config(format!(
            "undefined template variable(s): {}",
            missing.join(", ")
        )))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Render every value of a string map
pub fn render_map(
    map: &BTreeMap<String, String>,
    ctx: &TemplateContext,
) -> Result<BTreeMap<String, String>> {
    map.iter()
        .map(|(key, value)| {
            let value = if has_templates(value) {
                render(value, ctx)?
            } else {
                value.clone()
            };
            Ok((key.clone(), value))
        })
        .collect()
}
