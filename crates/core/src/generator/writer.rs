//! Policy-aware file writing.
//!
//! Every function here is blocking and runs on a `spawn_blocking` thread.
//! Content comparison is by SHA-256; replacement goes through a temporary
//! file in the target directory that is persisted over the target.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use sc_protocol::{FileAction, GeneratedFile, WritePolicy};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::error::{GenerationError, GenerationResult};

pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Validates an artifact path and resolves it under `root`.
///
/// # Errors
///
/// Returns `GenerationError::UnsafePath` for empty or absolute paths and
/// for paths with `..` components.
pub fn resolve_target(root: &Path, relative: &str) -> GenerationResult<PathBuf> {
    let unsafe_path = |reason: &str| GenerationError::UnsafePath {
        path: relative.to_string(),
        reason: reason.to_string(),
    };

    if relative.trim().is_empty() {
        return Err(unsafe_path("path is empty"));
    }
    let path = Path::new(relative);
    if path.is_absolute() || relative.starts_with('/') || relative.starts_with('\\') {
        return Err(unsafe_path("path is absolute"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_path("path leaves the output root")),
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path("path is absolute")),
        }
    }
    Ok(root.join(path))
}

/// `<name>.<UTC timestamp>.bak` beside `target`, numbered when taken.
pub fn backup_path(target: &Path, now: DateTime<Utc>) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let stamp = now.format("%Y%m%dT%H%M%S%.3fZ");
    let first = target.with_file_name(format!("{name}.{stamp}.bak"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| target.with_file_name(format!("{name}.{stamp}.{n}.bak")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// A decided write, not yet executed.
#[derive(Debug)]
pub struct WritePlan {
    pub target: PathBuf,
    pub action: FileAction,
    /// Present when the plan replaces existing content and backups are on.
    pub backup: Option<PathBuf>,
}

/// Decides what to do with `file` given the current content at `target`.
///
/// # Errors
///
/// Returns `GenerationError::Read` when an existing target cannot be read.
pub fn plan_write(
    target: PathBuf,
    file: &GeneratedFile,
    force: bool,
    backup: bool,
    now: DateTime<Utc>,
) -> GenerationResult<WritePlan> {
    let skip = |target: PathBuf, reason: &str| WritePlan {
        target,
        action: FileAction::Skip {
            reason: reason.to_string(),
        },
        backup: None,
    };

    let existing = match fs::read(&target) {
        Ok(existing) => existing,
        // A file standing where a parent directory belongs fails later, at write time.
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(WritePlan {
                target,
                action: FileAction::Create,
                backup: None,
            });
        }
        Err(source) => return Err(GenerationError::Read { path: target, source }),
    };

    if sha256_hex(&existing) == file.sha256 {
        return Ok(skip(target, "unchanged"));
    }

    let replace = match file.policy {
        WritePolicy::Create => return Ok(skip(target, "exists")),
        WritePolicy::Overwrite => true,
        WritePolicy::SkipIfUnchanged => force,
    };
    if !replace {
        return Ok(WritePlan {
            target,
            action: FileAction::Conflict,
            backup: None,
        });
    }

    let backup = backup.then(|| backup_path(&target, now));
    Ok(WritePlan {
        action: FileAction::Overwrite {
            backup: backup.as_ref().map(|path| path.to_string_lossy().to_string()),
        },
        target,
        backup,
    })
}

/// Carries out a `Create` or `Overwrite` plan.
///
/// # Errors
///
/// Returns the first directory, backup or write failure.
pub fn execute(plan: &WritePlan, content: &[u8]) -> GenerationResult<()> {
    if !matches!(plan.action, FileAction::Create | FileAction::Overwrite { .. }) {
        return Ok(());
    }
    let dir = plan
        .target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).map_err(|source| GenerationError::DirectoryCreate {
        path: dir.clone(),
        source,
    })?;

    if let Some(backup) = &plan.backup {
        fs::copy(&plan.target, backup).map_err(|source| GenerationError::Backup {
            path: plan.target.clone(),
            source,
        })?;
    }

    let write_error = |source: std::io::Error| GenerationError::FileWrite {
        path: plan.target.clone(),
        source,
    };
    let mut temp = NamedTempFile::new_in(&dir).map_err(write_error)?;
    temp.write_all(content).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(&plan.target).map_err(|err| write_error(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_protocol::FileType;
    use tempfile::tempdir;

    fn file(path: &str, content: &str, policy: WritePolicy) -> GeneratedFile {
        GeneratedFile {
            path: path.to_string(),
            content: content.as_bytes().to_vec(),
            file_type: FileType::from_path(path),
            policy,
            category: None,
            size: content.len(),
            sha256: sha256_hex(content.as_bytes()),
        }
    }

    #[test]
    fn test_resolve_target_rejects_escapes() {
        let root = Path::new("/out");
        assert_eq!(
            resolve_target(root, "agents/a.ts").expect("safe path"),
            PathBuf::from("/out/agents/a.ts")
        );
        for bad in ["", "/etc/passwd", "../x.ts", "agents/../../x.ts"] {
            assert!(
                matches!(resolve_target(root, bad), Err(GenerationError::UnsafePath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_plan_actions_by_policy() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let target = temp_dir.path().join("a.ts");
        let now = Utc::now();

        let plan = plan_write(target.clone(), &file("a.ts", "new", WritePolicy::SkipIfUnchanged), false, true, now)
            .expect("Failed to plan");
        assert_eq!(plan.action, FileAction::Create);

        fs::write(&target, "old").expect("Failed to write");
        let same = plan_write(target.clone(), &file("a.ts", "old", WritePolicy::SkipIfUnchanged), false, true, now)
            .expect("Failed to plan");
        assert!(matches!(same.action, FileAction::Skip { ref reason } if reason == "unchanged"));

        let conflict = plan_write(target.clone(), &file("a.ts", "new", WritePolicy::SkipIfUnchanged), false, true, now)
            .expect("Failed to plan");
        assert_eq!(conflict.action, FileAction::Conflict);

        let forced = plan_write(target.clone(), &file("a.ts", "new", WritePolicy::SkipIfUnchanged), true, true, now)
            .expect("Failed to plan");
        assert!(matches!(forced.action, FileAction::Overwrite { backup: Some(_) }));

        let created_only = plan_write(target.clone(), &file("a.ts", "new", WritePolicy::Create), true, true, now)
            .expect("Failed to plan");
        assert!(matches!(created_only.action, FileAction::Skip { ref reason } if reason == "exists"));

        let overwrite = plan_write(target, &file("a.ts", "new", WritePolicy::Overwrite), false, false, now)
            .expect("Failed to plan");
        assert_eq!(overwrite.action, FileAction::Overwrite { backup: None });
    }

    #[test]
    fn test_backup_restores_previous_content() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let target = temp_dir.path().join("config.json");
        fs::write(&target, "{\"v\": 1}").expect("Failed to write");

        let plan = plan_write(
            target.clone(),
            &file("config.json", "{\"v\": 2}", WritePolicy::SkipIfUnchanged),
            true,
            true,
            Utc::now(),
        )
        .expect("Failed to plan");
        execute(&plan, b"{\"v\": 2}").expect("Failed to execute");

        let backup = plan.backup.expect("Backup planned");
        assert_eq!(fs::read_to_string(&target).expect("read target"), "{\"v\": 2}");
        assert_eq!(fs::read_to_string(&backup).expect("read backup"), "{\"v\": 1}");
        let name = backup.file_name().expect("name").to_string_lossy().to_string();
        assert!(name.starts_with("config.json.") && name.ends_with("Z.bak"), "unexpected name {name}");
    }

    #[test]
    fn test_blocked_parent_fails_at_write() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("agents"), "not a directory").expect("Failed to write");
        let target = temp_dir.path().join("agents/a.ts");

        let plan = plan_write(target, &file("agents/a.ts", "new", WritePolicy::SkipIfUnchanged), false, true, Utc::now())
            .expect("Failed to plan");
        assert_eq!(plan.action, FileAction::Create);

        let result = execute(&plan, b"new");
        assert!(matches!(result, Err(GenerationError::DirectoryCreate { .. })), "{result:?}");
    }

    #[test]
    fn test_backup_names_do_not_collide() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let target = temp_dir.path().join("a.ts");
        let now = Utc::now();

        let first = backup_path(&target, now);
        fs::write(&first, "taken").expect("Failed to write");
        let second = backup_path(&target, now);

        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with(".1.bak"));
    }
}
