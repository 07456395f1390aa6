//! Typed results for the built-in operations.
//!
//! Every field has a serde default, so a response that parsed but lacks
//! some fields still deserializes into a degraded value instead of failing.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::template::{CLUSTER_SUMMARY, ISSUE_SUMMARY, REQUIREMENT_CARDS};

/// A typed result bound to a template operation.
pub trait StructuredOutput: DeserializeOwned {
    /// Operation (template) name producing this result.
    const OPERATION: &'static str;
}

/// Typed result plus the gateway metadata callers usually need.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured<T> {
    pub value: T,
    pub quality: u8,
    pub cache_hit: bool,
}

/// Input to [`Gateway::summarize_issue`](crate::Gateway::summarize_issue).
#[derive(Debug, Clone, Default)]
pub struct IssueInput {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
}

impl IssueInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub(crate) fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("title".to_string(), self.title.clone()),
            ("description".to_string(), self.description.clone()),
            (
                "category".to_string(),
                self.category.clone().unwrap_or_else(|| "uncategorized".to_string()),
            ),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub sentiment: Option<String>,
    pub confidence: Option<f64>,
}

impl StructuredOutput for IssueSummary {
    const OPERATION: &'static str = ISSUE_SUMMARY;
}

/// Input to [`Gateway::summarize_cluster`](crate::Gateway::summarize_cluster).
#[derive(Debug, Clone, Default)]
pub struct ClusterInput {
    pub name: String,
    /// One line per issue (typically the title).
    pub issues: Vec<String>,
}

impl ClusterInput {
    pub fn new(name: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            name: name.into(),
            issues,
        }
    }

    pub(crate) fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("cluster_name".to_string(), self.name.clone()),
            ("issues".to_string(), bullet_list(&self.issues)),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSummary {
    pub title: String,
    pub summary: String,
    pub common_themes: Vec<String>,
    pub confidence: Option<f64>,
}

impl StructuredOutput for ClusterSummary {
    const OPERATION: &'static str = CLUSTER_SUMMARY;
}

/// Input to [`Gateway::generate_requirement_cards`](crate::Gateway::generate_requirement_cards).
#[derive(Debug, Clone, Default)]
pub struct RequirementInput {
    pub initiative: String,
    pub description: String,
    pub issues: Vec<String>,
}

impl RequirementInput {
    pub fn new(initiative: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            initiative: initiative.into(),
            description: description.into(),
            issues: Vec::new(),
        }
    }

    pub fn issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    pub(crate) fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("initiative".to_string(), self.initiative.clone()),
            ("description".to_string(), self.description.clone()),
            ("issues".to_string(), bullet_list(&self.issues)),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementCard {
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementCards {
    pub cards: Vec<RequirementCard>,
}

impl StructuredOutput for RequirementCards {
    const OPERATION: &'static str = REQUIREMENT_CARDS;
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}
