//! Custom assertion helpers for the integration tests.

use sc_protocol::{DetectionResult, FileAction, GenerationSummary, IssueKind};

/// Assert that a detection result carries no errors.
#[allow(dead_code)]
pub fn assert_no_errors(detection: &DetectionResult) {
    assert!(
        detection.errors.is_empty(),
        "Expected no detection errors, got: {:?}",
        detection.errors
    );
}

/// The action recorded for `path`, panicking when the file is not listed.
#[allow(dead_code)]
pub fn action_for<'a>(summary: &'a GenerationSummary, path: &str) -> &'a FileAction {
    summary
        .files
        .iter()
        .find(|outcome| outcome.path == path)
        .map(|outcome| &outcome.action)
        .unwrap_or_else(|| panic!("{path} missing from generation summary"))
}

/// Assert that every listed file has the same action.
#[allow(dead_code)]
pub fn assert_all_actions(summary: &GenerationSummary, expected: &FileAction) {
    for outcome in &summary.files {
        assert_eq!(
            &outcome.action, expected,
            "Unexpected action for {}",
            outcome.path
        );
    }
}

/// Count the issues of one kind among errors and warnings.
#[allow(dead_code)]
pub fn count_issues(summary: &GenerationSummary, kind: IssueKind) -> usize {
    summary
        .errors
        .iter()
        .chain(&summary.warnings)
        .filter(|issue| issue.kind == kind)
        .count()
}
