//! Index schema templates.
//!
//! A template carries preset settings and mappings for every index whose
//! name matches one of its patterns. Patterns are exact names or a prefix
//! followed by a trailing `*`.

use crate::core::error::{QuarryError, Result};
use crate::core::types::{IndexSettings, Mappings};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema preset applied to newly created indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub index_patterns: Vec<String>,

    /// Higher wins when several templates match
    #[serde(default)]
    pub priority: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<IndexSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Mappings>,
}

impl Template {
    pub fn new(name: impl Into<String>, index_patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            index_patterns,
            priority: 0,
            settings: None,
            mappings: None,
        }
    }

    pub fn matches(&self, index_name: &str) -> bool {
        self.index_patterns
            .iter()
            .any(|pattern| pattern_matches(pattern, index_name))
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// Thread-safe collection of templates, keyed by template name
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: RwLock<HashMap<String, Template>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a template
    pub fn put(&self, template: Template) -> Result<()> {
        if template.name.is_empty() {
            return Err(QuarryError::ConfigError(
                "template name cannot be empty".to_string(),
            ));
        }
        if template.index_patterns.is_empty() {
            return Err(QuarryError::ConfigError(format!(
                "template [{}] has no index patterns",
                template.name
            )));
        }
        if let Some(bad) = template
            .index_patterns
            .iter()
            .find(|p| p.is_empty() || p.strip_suffix('*').unwrap_or(p).contains('*'))
        {
            return Err(QuarryError::ConfigError(format!(
                "template [{}] pattern [{bad}] is invalid, only a trailing * is allowed",
                template.name
            )));
        }

        tracing::debug!("Template '{}' registered", template.name);
        self.templates.write().insert(template.name.clone(), template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Template> {
        self.templates.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Template> {
        self.templates.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    /// Highest-priority template matching `index_name`
    ///
    /// Ties are broken by template name so the choice is stable.
    pub fn find(&self, index_name: &str) -> Option<Template> {
        self.templates
            .read()
            .values()
            .filter(|t| t.matches(index_name))
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.name.cmp(&a.name))
            })
            .cloned()
    }
}
