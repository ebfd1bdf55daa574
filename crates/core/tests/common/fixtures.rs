//! Fixtures for building sample repositories on disk.

use std::path::Path;

use sc_protocol::PipelineConfig;
use tempfile::TempDir;

/// Persona names in the fixture, in file order.
#[allow(dead_code)]
pub const PERSONA_NAMES: [&str; 9] = [
    "architect",
    "frontend",
    "backend",
    "analyzer",
    "security",
    "mentor",
    "refactorer",
    "performance",
    "qa",
];

#[allow(dead_code)]
pub const PERSONAS_YML: &str = r#"# SuperClaude Personas

## All_Personas
architect:
  Identity: "Systems architect | Scalability specialist"
  Core_Belief: "Systems evolve, design for change"
  Primary_Question: "How will this scale?"
  MCP_Preferences: "Sequential(primary) + Context7(patterns)"
frontend:
  Identity: "UX specialist | Accessibility advocate"
  Core_Belief: "User experience determines product success"
  MCP_Preferences: "Magic(primary) + Puppeteer(testing) + Context7(frameworks)"
backend:
  Identity: "Reliability engineer | Performance specialist"
  Primary_Question: "Will this handle 10x load?"
  MCP_Preferences: "Context7(primary) + Sequential(scalability)"
analyzer:
  Identity: "Root cause specialist"
  Focus: "Evidence over assumptions"
  MCP_Preferences: "Sequential(primary) + Puppeteer(reproduction)"
security:
  Identity: "Security architect | Threat modeler"
  Core_Belief: "Threats exist everywhere"
  MCP_Preferences: "Sequential(threat modeling) + Context7(security patterns)"
mentor:
  Identity: "Technical educator"
  Core_Belief: "Understanding grows through guided discovery"
  MCP_Preferences: "Context7(learning resources)"
refactorer:
  Identity: "Code quality specialist"
  Problem_Solving: "Eliminate duplication, clarify intent"
  MCP_Preferences: "Sequential(analysis) + Context7(patterns)"
performance:
  Identity: "Performance engineer"
  Decision_Framework: "Measure first, optimise the critical path"
  MCP_Preferences: "Puppeteer(metrics) + Sequential(bottleneck analysis)"
qa:
  Identity: "Quality advocate | Testing specialist"
  Primary_Question: "How could this break?"
  MCP_Preferences: "Puppeteer(testing) + Sequential(edge cases)"
"#;

#[allow(dead_code)]
pub const BUILD_MD: &str = r#"---
name: build
description: Build projects and components
category: Code Generation
examples:
  - command: "/build --react"
    description: "React app"
---
# /build

| Flag | Type | Description | Default |
|------|------|-------------|---------|
| `--react` | boolean | React project | - |
| `--port` | number | Dev server port | 3000 |
| `--env` | string | Target environment | dev |
"#;

#[allow(dead_code)]
pub const FIX_MD: &str = r#"# /user:fix

Purpose: "Fix bugs with root cause analysis"

Use --trace [Follow execution paths] and --seq [Sequential reasoning].

## Examples
- `/fix --trace` - Trace the failing path
"#;

#[allow(dead_code)]
pub const HELP_MD: &str = "# Help\n\nExplain available commands and flags.\n";

#[allow(dead_code)]
pub const SYNC_MD: &str = "# Sync\n\nKeep generated files aligned with their sources.\n";

#[allow(dead_code)]
pub const EXECUTION_PATTERNS_YML: &str = r#"# Execution Patterns

Server definitions follow.

```yaml
Servers:
  Magic:
    Purpose: "UI component generation"
  Context7:
    Purpose: "Library documentation lookup"
```
"#;

#[allow(dead_code)]
pub const MCP_REFERENCE_YML: &str = r#"# MCP Reference

## Server_Capabilities_Extended
Magic:
  Purpose: "Ignored later purpose"
  Capabilities: "Component generation | Design systems"
Sequential:
  Purpose: "Multi-step reasoning"
  Capabilities: "Problem decomposition | Hypothesis testing"
  Best_For: "Architecture | Debugging"
  Workflows: "Analyze → Plan → Verify"

## Token_Economics
Budget_Allocation: "Native:40% | Light_MCP:30%"
Abort_Conditions: "Context>50% | Timeout"
"#;

#[allow(dead_code)]
pub const CACHE_PATTERNS_YML: &str = r#"Command_Integration:
  build: "Magic for UI | C7 for framework docs"
  test: "Puppeteer for e2e --pup"
"#;

#[allow(dead_code)]
pub const COMPRESSION_YML: &str = r#"# Compression Patterns

## Token_Economics
Budget: "40% native"

## UltraCompressed_Mode
Activation:
  Natural_Language: "compress | concise | brief"
Rules:
  Symbols:
    "leads to": "→"
    "and": "&"
  Abbreviations:
    configuration: cfg
    implementation: impl
  Word-Removal: ["the", "a", "an"]
Performance_Target: "~70% reduction"
"#;

fn write(root: &Path, relative: &str, content: &str) -> std::io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

/// Create a temporary repository laid out like a SuperClaude checkout.
///
/// This creates:
/// - `.claude/shared/superclaude-personas.yml` with nine personas
/// - Four commands under `.claude/commands/` plus a `shared/` directory
///   that command discovery must ignore
/// - The three server documents, one per encoding
/// - The compression rule document
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_superclaude_repo() -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path();

    write(root, ".claude/shared/superclaude-personas.yml", PERSONAS_YML)?;
    write(root, ".claude/commands/build.md", BUILD_MD)?;
    write(root, ".claude/commands/fix.md", FIX_MD)?;
    write(root, ".claude/commands/help.md", HELP_MD)?;
    write(root, ".claude/commands/sync.md", SYNC_MD)?;
    write(root, ".claude/commands/shared/notes.md", "# Not a command\n")?;
    write(root, ".claude/commands/shared/execution-patterns.yml", EXECUTION_PATTERNS_YML)?;
    write(root, ".claude/shared/superclaude-mcp.yml", MCP_REFERENCE_YML)?;
    write(root, ".claude/commands/shared/mcp-cache-patterns.yml", CACHE_PATTERNS_YML)?;
    write(
        root,
        ".claude/commands/shared/compression-performance-patterns.yml",
        COMPRESSION_YML,
    )?;

    Ok(temp_dir)
}

/// Default configuration writing into `output`.
#[allow(dead_code)]
pub fn config_for(output: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.output_dir = output.display().to_string();
    config
}
