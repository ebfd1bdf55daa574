//! Declarative alias tables used by the transformation engine.
//!
//! Every lookup is case-insensitive. Entries from `[mapping]` in the
//! configuration file are layered over the built-in tables and take
//! precedence over them.

use std::collections::BTreeMap;

use sc_protocol::MappingOverrides;

pub const DEFAULT_TARGET_MODEL: &str = "anthropic/claude-3-5-sonnet-20241022";

/// Category used for anything the category table does not know.
pub const FALLBACK_CATEGORY: &str = "Utilities";

const MODEL_ALIASES: [(&str, &str); 10] = [
    ("claude-3-opus", "anthropic/claude-3-opus-20240229"),
    ("claude-3-sonnet", "anthropic/claude-3-sonnet-20240229"),
    ("claude-3-haiku", "anthropic/claude-3-haiku-20240307"),
    ("claude-3-5-sonnet", "anthropic/claude-3-5-sonnet-20241022"),
    ("claude-3-5-haiku", "anthropic/claude-3-5-haiku-20241022"),
    ("claude-sonnet-4", "anthropic/claude-sonnet-4-20250514"),
    ("claude-opus-4", "anthropic/claude-opus-4-20250514"),
    ("opus", "anthropic/claude-3-opus-20240229"),
    ("sonnet", "anthropic/claude-3-5-sonnet-20241022"),
    ("haiku", "anthropic/claude-3-haiku-20240307"),
];

const TOOL_ALIASES: [(&str, &str); 14] = [
    ("sequential", "sequential-thinking"),
    ("seq", "sequential-thinking"),
    ("research", "context7"),
    ("context7", "context7"),
    ("c7", "context7"),
    ("magic", "magic"),
    ("browser", "puppeteer"),
    ("puppeteer", "puppeteer"),
    ("read", "read"),
    ("write", "write"),
    ("edit", "edit"),
    ("bash", "bash"),
    ("grep", "grep"),
    ("glob", "glob"),
];

const CATEGORY_ALIASES: [(&str, &str); 20] = [
    ("ai development", "AI Development"),
    ("code generation", "Code Generation"),
    ("generation", "Code Generation"),
    ("debugging", "Debugging"),
    ("debug", "Debugging"),
    ("documentation", "Documentation"),
    ("docs", "Documentation"),
    ("utilities", "Utilities"),
    ("utility", "Utilities"),
    ("development", "Development"),
    ("analysis", "Analysis"),
    ("operations", "Operations"),
    ("ops", "Operations"),
    ("design", "Design"),
    ("testing", "Testing"),
    ("test", "Testing"),
    ("quality", "Quality"),
    ("security", "Security"),
    ("planning", "Planning"),
    ("workflow", "Workflow"),
];

/// Normalized command flag types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagType {
    String,
    Boolean,
    Number,
}

impl FlagType {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagType::String => "string",
            FlagType::Boolean => "boolean",
            FlagType::Number => "number",
        }
    }
}

/// Result of one alias lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub value: String,
    /// Set when the input was unknown and a substitute was used.
    pub substituted: bool,
}

impl Lookup {
    fn known(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            substituted: false,
        }
    }

    fn substitute(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            substituted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingTables {
    default_model: String,
    models: BTreeMap<String, String>,
    tools: BTreeMap<String, String>,
    categories: BTreeMap<String, String>,
}

impl Default for MappingTables {
    fn default() -> Self {
        Self::with_overrides(&MappingOverrides::default())
    }
}

fn table(builtin: &[(&str, &str)], overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut table: BTreeMap<String, String> = builtin
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
    for (from, to) in overrides {
        table.insert(from.trim().to_lowercase(), to.clone());
    }
    table
}

impl MappingTables {
    /// Built-in tables extended by the configured overrides.
    pub fn with_overrides(overrides: &MappingOverrides) -> Self {
        Self {
            default_model: overrides
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_TARGET_MODEL.to_string()),
            models: table(&MODEL_ALIASES, &overrides.models),
            tools: table(&TOOL_ALIASES, &overrides.tools),
            categories: table(&CATEGORY_ALIASES, &overrides.categories),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Maps a source model name to a provider-qualified identifier.
    ///
    /// Identifiers that already name a target model pass through unchanged;
    /// unknown names fall back to the default model.
    pub fn model(&self, name: &str) -> Lookup {
        let key = name.trim().to_lowercase();
        if let Some(target) = self.models.get(&key) {
            return Lookup::known(target.clone());
        }
        if self.models.values().any(|target| target.eq_ignore_ascii_case(name.trim())) {
            return Lookup::known(name.trim());
        }
        Lookup::substitute(self.default_model.clone())
    }

    /// Maps a tool name. Unknown tools are kept as written.
    pub fn tool(&self, name: &str) -> Lookup {
        match self.tools.get(&name.trim().to_lowercase()) {
            Some(target) => Lookup::known(target.clone()),
            None => Lookup::substitute(name.trim()),
        }
    }

    /// Maps a category to its canonical spelling, or to `Utilities`.
    pub fn category(&self, name: &str) -> Lookup {
        match self.categories.get(&name.trim().to_lowercase()) {
            Some(target) => Lookup::known(target.clone()),
            None => Lookup::substitute(FALLBACK_CATEGORY),
        }
    }

    /// Normalizes a raw flag type. Unknown types become `string`.
    pub fn flag_type(&self, raw: &str) -> (FlagType, bool) {
        match raw.trim().to_lowercase().as_str() {
            "string" | "str" | "text" | "path" | "enum" | "" => (FlagType::String, false),
            "boolean" | "bool" | "flag" => (FlagType::Boolean, false),
            "number" | "int" | "integer" | "float" | "num" => (FlagType::Number, false),
            _ => (FlagType::String, true),
        }
    }
}
