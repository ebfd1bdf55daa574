//! Typed features extracted from a SuperClaude-style source repository.
//!
//! These structures are produced by the detectors in `sc-core` and consumed
//! read-only by the transformation engine. Collections that must compare
//! equal across runs use `BTreeMap` so their iteration order is stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A named agent profile.
///
/// # Example
///
/// ```yaml
/// All_Personas:
///   architect:
///     Identity: "Systems architect"
///     Core_Belief: "Systems evolve"
///     MCP_Preferences: "Primary: Sequential | Secondary: Context7"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Unique name within a run.
    pub name: String,
    pub description: String,
    /// Composed from identity, belief and question fields, in a fixed order.
    pub system_prompt: String,
    /// Model identifier as written in the source (before alias mapping).
    pub model: String,
    pub temperature: f64,
    /// Ordered, de-duplicated tool names.
    pub tools: Vec<String>,
    /// Glob patterns that auto-activate this persona.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_activate: Vec<String>,
    /// Path of the document the persona was read from.
    pub source: String,
}

/// A named CLI action descriptor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub name: String,
    pub purpose: String,
    /// Declared in the source, or inferred from the name.
    pub category: String,
    /// `true` when `category` came from the keyword table rather than the source.
    #[serde(default)]
    pub category_inferred: bool,
    pub flags: Vec<CommandFlag>,
    pub examples: Vec<CommandExample>,
    /// Markdown body without frontmatter.
    pub body: String,
    pub source: String,
}

/// One flag of a [`Command`]. `flag_type` is the raw type string from the source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct CommandFlag {
    pub name: String,
    #[serde(rename = "type")]
    pub flag_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct CommandExample {
    pub command: String,
    pub description: String,
}

/// A named protocol-server descriptor.
///
/// Several source documents may describe the same server; their fragments are
/// merged field by field and a populated field is never blanked by a later,
/// sparser fragment.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub best_for: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_cost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Command name to default-activation parameters.
    #[serde(default)]
    pub command_defaults: BTreeMap<String, CommandDefault>,
    #[serde(default)]
    pub workflows: BTreeMap<String, ServerWorkflow>,
}

/// Default activation of a server for one command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct CommandDefault {
    /// The usage fragment that mentioned the server, e.g. `Magic for UI components`.
    pub note: String,
    /// Control flag that enables the server, e.g. `--magic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ServerWorkflow {
    pub name: String,
    pub steps: Vec<String>,
}

/// A context trigger such as `import_statements -> Context7 REQUIRED`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ContextTrigger {
    pub pattern: String,
    pub action: String,
    pub required: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct QualityCheck {
    pub server: String,
    pub checks: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct TokenEconomics {
    #[serde(default)]
    pub budget_allocation: Vec<String>,
    #[serde(default)]
    pub intelligent_escalation: Vec<String>,
    #[serde(default)]
    pub abort_conditions: Vec<String>,
    #[serde(default)]
    pub efficiency_patterns: Vec<String>,
}

impl TokenEconomics {
    pub fn is_empty(&self) -> bool {
        self.budget_allocation.is_empty()
            && self.intelligent_escalation.is_empty()
            && self.abort_conditions.is_empty()
            && self.efficiency_patterns.is_empty()
    }
}

/// Every server-related feature found in a repository.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ServerCatalog {
    pub servers: BTreeMap<String, ServerSpec>,
    #[serde(default)]
    pub context_triggers: BTreeMap<String, ContextTrigger>,
    #[serde(default)]
    pub quality_checks: BTreeMap<String, QualityCheck>,
    #[serde(default)]
    pub token_economics: TokenEconomics,
}

impl ServerCatalog {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
            && self.context_triggers.is_empty()
            && self.quality_checks.is_empty()
            && self.token_economics.is_empty()
    }
}

/// A text-compression rule set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSpec {
    /// Phrase to symbol substitutions.
    pub symbols: BTreeMap<String, String>,
    /// Word to abbreviation substitutions.
    pub abbreviations: BTreeMap<String, String>,
    /// Natural-language trigger keywords.
    pub triggers: Vec<String>,
    /// Command-line flags enabling compression.
    pub flags: Vec<String>,
    #[serde(default)]
    pub word_removal: Vec<String>,
    /// Target size reduction, within `[0, 1]`.
    pub target_ratio: f64,
    pub source: String,
}
