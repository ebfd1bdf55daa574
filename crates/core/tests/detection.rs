//! Detection over a complete SuperClaude-shaped repository.

mod common;

use std::sync::Arc;

use common::*;
use sc_core::cache::SharedCache;
use sc_core::detect::{DetectionContext, DetectorCoordinator};
use sc_protocol::{FeatureKind, IssueKind};
use tokio_util::sync::CancellationToken;

fn context(root: &std::path::Path, cache: Arc<SharedCache>) -> Arc<DetectionContext> {
    Arc::new(DetectionContext::new(root, cache))
}

#[tokio::test]
async fn test_detects_every_category() {
    let repo = create_superclaude_repo().expect("Failed to create repo");

    let result = DetectorCoordinator::with_defaults()
        .detect(context(repo.path(), Arc::new(SharedCache::new())))
        .await;

    assert_no_errors(&result);
    assert!(!result.cancelled);

    let names: Vec<&str> = result.personas.iter().map(|p| p.name.as_str()).collect();
    let mut expected = PERSONA_NAMES.to_vec();
    expected.sort_unstable();
    assert_eq!(names, expected);
    for persona in &result.personas {
        assert!(!persona.tools.is_empty(), "{} should have tools", persona.name);
        assert!(persona.system_prompt.starts_with("You are: "), "{}", persona.system_prompt);
        assert_eq!(persona.source, ".claude/shared/superclaude-personas.yml");
    }
    let frontend = result.personas.iter().find(|p| p.name == "frontend").expect("Missing frontend");
    assert_eq!(frontend.tools, vec!["research", "magic", "browser"]);

    let commands: Vec<(&str, &str)> = result
        .commands
        .iter()
        .map(|c| (c.name.as_str(), c.category.as_str()))
        .collect();
    assert_eq!(
        commands,
        vec![
            ("build", "Code Generation"),
            ("fix", "Debugging"),
            ("help", "Documentation"),
            ("sync", "Utilities"),
        ]
    );
    let build = &result.commands[0];
    assert!(!build.category_inferred);
    assert_eq!(build.flags.len(), 3);
    assert_eq!(build.examples.len(), 1);
    let fix = &result.commands[1];
    assert!(fix.category_inferred);
    assert_eq!(fix.purpose, "Fix bugs with root cause analysis");
    let fix_flags: Vec<&str> = fix.flags.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fix_flags, vec!["trace", "seq"]);

    let servers: Vec<&str> = result.servers.servers.keys().map(String::as_str).collect();
    assert_eq!(servers, vec!["Context7", "Magic", "Puppeteer", "Sequential"]);

    let compression = result.compression.as_ref().expect("Missing compression");
    assert_eq!(compression.abbreviations.get("configuration").map(String::as_str), Some("cfg"));
    assert_eq!(result.count(FeatureKind::Compression), 1);
}

#[tokio::test]
async fn test_server_fragments_merge_across_documents() {
    let repo = create_superclaude_repo().expect("Failed to create repo");

    let result = DetectorCoordinator::for_kinds(&[FeatureKind::Servers])
        .detect(context(repo.path(), Arc::new(SharedCache::new())))
        .await;

    let magic = result.servers.servers.get("Magic").expect("Missing Magic");
    // The fenced document comes first, so its purpose survives.
    assert_eq!(magic.purpose, "UI component generation");
    assert_eq!(magic.capabilities, vec!["Component generation", "Design systems"]);
    assert!(magic.command_defaults.contains_key("build"));

    let context7 = result.servers.servers.get("Context7").expect("Missing Context7");
    assert_eq!(context7.purpose, "Library documentation lookup");
    assert_eq!(
        context7.command_defaults.get("build").and_then(|d| d.flag.as_deref()),
        Some("--c7")
    );

    assert_eq!(result.servers.token_economics.budget_allocation.len(), 2);
    assert!(result.personas.is_empty());
    assert!(result.commands.is_empty());
}

#[tokio::test]
async fn test_repeated_detection_is_idempotent_and_cached() {
    let repo = create_superclaude_repo().expect("Failed to create repo");
    let cache = Arc::new(SharedCache::new());
    let coordinator = DetectorCoordinator::with_defaults();

    let first = coordinator.detect(context(repo.path(), Arc::clone(&cache))).await;
    let after_first = cache.stats();
    let second = coordinator.detect(context(repo.path(), Arc::clone(&cache))).await;
    let after_second = cache.stats();

    assert_eq!(first, second);
    let second_run_hits = after_second.hits() - after_first.hits();
    assert_eq!(after_second.misses(), after_first.misses());
    assert!(
        second_run_hits > after_first.hits(),
        "second run hits {second_run_hits} should exceed first run hits {}",
        after_first.hits()
    );
}

#[tokio::test]
async fn test_concurrent_matches_sequential() {
    let repo = create_superclaude_repo().expect("Failed to create repo");
    let coordinator = DetectorCoordinator::with_defaults();

    let concurrent = coordinator
        .detect(context(repo.path(), Arc::new(SharedCache::new())))
        .await;
    let sequential = coordinator
        .detect_sequential(&DetectionContext::new(repo.path(), Arc::new(SharedCache::new())))
        .await;

    assert!(concurrent.same_features(&sequential));
    assert_eq!(concurrent.errors, sequential.errors);
    assert_eq!(concurrent.warnings, sequential.warnings);
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_result() {
    let repo = create_superclaude_repo().expect("Failed to create repo");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let ctx = DetectionContext::new(repo.path(), Arc::new(SharedCache::new())).with_cancel(cancel);
    let result = DetectorCoordinator::with_defaults().detect(Arc::new(ctx)).await;

    assert!(result.cancelled);
    assert!(result.personas.is_empty());
    assert!(result.commands.is_empty());
    assert!(!result.errors.is_empty());
    assert!(result.errors.iter().all(|issue| issue.kind == IssueKind::Cancelled));
}

#[tokio::test]
async fn test_empty_repository_yields_nothing() {
    let repo = tempfile::tempdir().expect("Failed to create temp dir");

    let result = DetectorCoordinator::with_defaults()
        .detect(context(repo.path(), Arc::new(SharedCache::new())))
        .await;

    assert_eq!(result, sc_protocol::DetectionResult::default());
}
