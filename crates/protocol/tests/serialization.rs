use std::collections::BTreeMap;

use sc_protocol::*;

#[test]
fn test_persona_deserialization_from_yaml() {
    let yaml_str = r#"
name: architect
description: Systems architect
systemPrompt: "You are: Systems architect"
model: claude-3-opus
temperature: 0.7
tools:
  - sequential
  - research
source: .claude/shared/superclaude-personas.yml
"#;

    let persona: Persona = serde_yaml::from_str(yaml_str).expect("Failed to deserialize Persona");

    assert_eq!(persona.name, "architect");
    assert_eq!(persona.tools, vec!["sequential", "research"]);
    assert!(persona.auto_activate.is_empty());
    assert!((persona.temperature - 0.7).abs() < f64::EPSILON);
}

#[test]
fn test_command_flag_uses_type_key() {
    let flag = CommandFlag {
        name: "watch".to_string(),
        flag_type: "boolean".to_string(),
        description: "Rebuild on change".to_string(),
        default: None,
        choices: Vec::new(),
    };

    let json = serde_json::to_value(&flag).expect("Failed to serialize CommandFlag");
    assert_eq!(json["type"], "boolean");
    assert!(json.get("default").is_none());
    assert!(json.get("choices").is_none());
}

#[test]
fn test_feature_kind_parse_accepts_aliases() {
    assert_eq!(FeatureKind::parse("persona"), Some(FeatureKind::Personas));
    assert_eq!(FeatureKind::parse("MCP"), Some(FeatureKind::Servers));
    assert_eq!(FeatureKind::parse(" compression "), Some(FeatureKind::Compression));
    assert_eq!(FeatureKind::parse("themes"), None);

    let json = serde_json::to_value(FeatureKind::Servers).expect("Failed to serialize FeatureKind");
    assert_eq!(json, "servers");
}

#[test]
fn test_detection_result_routes_issues_by_kind() {
    let mut result = DetectionResult::default();
    result.record(PipelineIssue::new(IssueKind::DuplicateName, Stage::Detect, "duplicate persona"));
    result.record(PipelineIssue::new(IssueKind::Parse, Stage::Parse, "bad yaml").with_line(Some(4)));

    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, Some(4));
}

#[test]
fn test_pipeline_issue_display() {
    let issue = PipelineIssue::new(IssueKind::Parse, Stage::Parse, "unexpected indent")
        .with_path("a.yml")
        .with_line(Some(3));

    assert_eq!(issue.to_string(), "[Parse] a.yml:3: unexpected indent");
}

#[test]
fn test_generated_file_skips_content_in_json() {
    let file = GeneratedFile {
        path: "agents/architect.ts".to_string(),
        content: b"export {}".to_vec(),
        file_type: FileType::TypeScript,
        policy: WritePolicy::SkipIfUnchanged,
        category: Some(FeatureKind::Personas),
        size: 9,
        sha256: "abc".to_string(),
    };

    let json = serde_json::to_value(&file).expect("Failed to serialize GeneratedFile");
    assert!(json.get("content").is_none());
    assert_eq!(json["policy"], "skip-if-unchanged");

    let back: GeneratedFile = serde_json::from_value(json).expect("Failed to deserialize GeneratedFile");
    assert!(back.content.is_empty());
    assert_eq!(back.size, 9);
}

#[test]
fn test_file_action_is_internally_tagged() {
    let action = FileAction::Overwrite {
        backup: Some("a.ts.20260101T000000.000Z.bak".to_string()),
    };

    let json = serde_json::to_value(&action).expect("Failed to serialize FileAction");
    assert_eq!(json["action"], "overwrite");
    assert!(json["backup"].is_string());

    let skip: FileAction =
        serde_json::from_str(r#"{"action":"skip","reason":"unchanged"}"#).expect("Failed to deserialize FileAction");
    assert_eq!(
        skip,
        FileAction::Skip {
            reason: "unchanged".to_string()
        }
    );
}

#[test]
fn test_pipeline_state_serialization() {
    let json = serde_json::to_value(PipelineState::Transforming).expect("Failed to serialize PipelineState");
    assert_eq!(json, "TRANSFORMING");
    assert!(PipelineState::Failed.is_terminal());
    assert!(!PipelineState::Generating.is_terminal());
}

#[test]
fn test_pipeline_event_serialization() {
    let event = PipelineEvent::StateChanged {
        run_id: uuid::Uuid::new_v4(),
        state: PipelineState::Detecting,
    };

    let json = serde_json::to_value(&event).expect("Failed to serialize PipelineEvent");
    assert_eq!(json["type"], "stateChanged");
    assert!(json["payload"].is_object());
}

#[test]
fn test_pipeline_config_from_toml() {
    let toml_str = r#"
output_dir = "out"

[features]
exclude = ["compression"]

[generator]
force = true

[mapping.models]
"claude-4-opus" = "anthropic/claude-opus-4"
"#;

    let config: PipelineConfig = toml::from_str(toml_str).expect("Failed to parse PipelineConfig");

    assert_eq!(config.output_dir, "out");
    assert!(config.generator.force);
    assert!(config.generator.backup);
    assert!(!config.generator.dry_run);
    assert_eq!(config.detector.default_model, DEFAULT_MODEL);
    assert_eq!(
        config.features.enabled(),
        vec![FeatureKind::Personas, FeatureKind::Commands, FeatureKind::Servers]
    );
    assert_eq!(
        config.mapping.models,
        BTreeMap::from([("claude-4-opus".to_string(), "anthropic/claude-opus-4".to_string())])
    );
}

#[test]
fn test_feature_selection_include_list() {
    let selection = FeatureSelection {
        include: vec!["personas".to_string(), "mcp".to_string()],
        exclude: Vec::new(),
    };

    assert_eq!(selection.enabled(), vec![FeatureKind::Personas, FeatureKind::Servers]);
    assert!(!selection.is_enabled(FeatureKind::Commands));
}

#[test]
fn test_generation_summary_totals() {
    let mut summary = GenerationSummary::default();
    summary.categories.insert(
        "personas".to_string(),
        CategoryCounts {
            detected: 2,
            written: 3,
            ..Default::default()
        },
    );
    summary.categories.insert(
        "commands".to_string(),
        CategoryCounts {
            detected: 1,
            conflicts: 1,
            ..Default::default()
        },
    );

    let total = summary.total();
    assert_eq!(total.detected, 3);
    assert_eq!(total.written, 3);
    assert_eq!(total.conflicts, 1);
}
