//! Prompt templates.
//!
//! Each gateway operation renders its prompt from a [`PromptTemplate`].
//! Every field substituted into a template is capped to a fixed number of
//! characters, so prompt size (and therefore provider cost) stays bounded
//! no matter how large the caller's input is.

use std::collections::HashMap;

use crate::{Result, SluiceError};

/// A named input slot in a template and its character cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub max_chars: usize,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, max_chars: usize) -> Self {
        Self {
            name: name.into(),
            max_chars,
        }
    }
}

/// Prompt shape bound to one operation.
///
/// Placeholders are written `{name}`. Immutable once registered.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Operation name (unique key in the registry).
    pub operation: String,
    pub template: String,
    pub fields: Vec<FieldSpec>,
    /// Top-level fields the structured response must carry. Empty means the
    /// response is returned as raw text without validation.
    pub expected_fields: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl PromptTemplate {
    pub fn new(operation: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            template: template.into(),
            fields: Vec::new(),
            expected_fields: Vec::new(),
            max_tokens: 500,
            temperature: 0.3,
        }
    }

    /// Declare a field and its character cap.
    pub fn field(mut self, name: impl Into<String>, max_chars: usize) -> Self {
        self.fields.push(FieldSpec::new(name, max_chars));
        self
    }

    /// Declare the fields a structured response must contain.
    pub fn expect(mut self, fields: &[&str]) -> Self {
        self.expected_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    fn cap_for(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.max_chars)
    }

    /// Substitute `fields` into the template.
    ///
    /// Values for undeclared placeholders are capped at [`UNDECLARED_FIELD_CAP`].
    /// Placeholders without a value render empty.
    pub fn render(&self, fields: &HashMap<String, String>) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_placeholder(&after[..close]) => {
                    let name = &after[..close];
                    if let Some(value) = fields.get(name) {
                        let cap = self.cap_for(name).unwrap_or(UNDECLARED_FIELD_CAP);
                        out.push_str(truncate_chars(value, cap));
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    // Literal brace (e.g. JSON examples in the prompt).
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Cap applied to values whose placeholder has no [`FieldSpec`].
pub const UNDECLARED_FIELD_CAP: usize = 1_000;

fn is_placeholder(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Operation name → template lookup table.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in operations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for template in default_templates() {
            registry.register(template);
        }
        registry
    }

    /// Register a template, replacing any previous one for the operation.
    pub fn register(&mut self, template: PromptTemplate) {
        self.templates.insert(template.operation.clone(), template);
    }

    pub fn get(&self, operation: &str) -> Option<&PromptTemplate> {
        self.templates.get(operation)
    }

    /// Render the template registered for `operation`.
    pub fn render(&self, operation: &str, fields: &HashMap<String, String>) -> Result<String> {
        self.get(operation)
            .map(|t| t.render(fields))
            .ok_or_else(|| SluiceError::TemplateNotFound(operation.to_string()))
    }

    /// Registered operation names, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }
}

pub const ISSUE_SUMMARY: &str = "issue_summary";
pub const CLUSTER_SUMMARY: &str = "cluster_summary";
pub const REQUIREMENT_CARDS: &str = "requirement_cards";

fn default_templates() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate::new(
            ISSUE_SUMMARY,
            "You are a product analyst. Summarize the customer issue below.\n\
             Respond with JSON only, shaped as \
             {\"summary\": string, \"key_points\": [string], \
             \"sentiment\": \"positive\"|\"neutral\"|\"negative\", \"confidence\": number 0-100}.\n\n\
             Title: {title}\nCategory: {category}\nDescription: {description}",
        )
        .field("title", 200)
        .field("description", 500)
        .field("category", 100)
        .expect(&["summary", "key_points", "sentiment", "confidence"])
        .max_tokens(400)
        .temperature(0.3),
        PromptTemplate::new(
            CLUSTER_SUMMARY,
            "You are a product analyst. The issues below were grouped together.\n\
             Describe what they have in common. Respond with JSON only, shaped as \
             {\"title\": string, \"summary\": string, \"common_themes\": [string], \
             \"confidence\": number 0-100}.\n\n\
             Cluster: {cluster_name}\nIssues:\n{issues}",
        )
        .field("cluster_name", 200)
        .field("issues", 2_000)
        .expect(&["title", "summary", "common_themes", "confidence"])
        .max_tokens(600)
        .temperature(0.3),
        PromptTemplate::new(
            REQUIREMENT_CARDS,
            "You are a product manager. Turn the initiative below into requirement cards.\n\
             Respond with JSON only, shaped as \
             {\"cards\": [{\"title\": string, \"description\": string, \
             \"acceptance_criteria\": [string], \"priority\": \"low\"|\"medium\"|\"high\"}]}.\n\n\
             Initiative: {initiative}\nDescription: {description}\nRelated issues:\n{issues}",
        )
        .field("initiative", 200)
        .field("description", 1_000)
        .field("issues", 1_500)
        .expect(&["cards"])
        .max_tokens(1_200)
        .temperature(0.4),
    ]
}
