use std::path::Path;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use diffsentry_core::{DiffSet, FileDiff, FileStatus, SentryError};
use git2::{Commit, Delta, Diff, DiffFindOptions, DiffOptions, Patch, Repository};

/// Diff HEAD against the working tree (staged and unstaged changes).
///
/// Untracked files are not included. Author and date come from HEAD.
///
/// # Errors
///
/// Returns [`SentryError::Git`] if the repository cannot be opened, has no
/// HEAD commit, or the diff cannot be computed.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use diffsentry_git::working_tree_diff;
///
/// let set = working_tree_diff(Path::new(".")).unwrap();
/// for record in &set.diffs {
///     println!("[{}] {}", record.status, record.path.display());
/// }
/// ```
pub fn working_tree_diff(repo_path: &Path) -> Result<DiffSet, SentryError> {
    let repo = open(repo_path)?;
    let head = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .map_err(|e| SentryError::Git(format!("failed to resolve HEAD: {e}")))?;
    let head_tree = head
        .tree()
        .map_err(|e| SentryError::Git(format!("failed to get HEAD tree: {e}")))?;

    let mut diff_opts = DiffOptions::new();
    let diff = repo
        .diff_tree_to_workdir_with_index(Some(&head_tree), Some(&mut diff_opts))
        .map_err(|e| SentryError::Git(format!("failed to compute working tree diff: {e}")))?;

    build_diff_set(&head, diff)
}

/// Diff the tree of `rev1` against the tree of `rev2`.
///
/// Revisions accept anything `git rev-parse` does. Author and date come
/// from `rev2`.
///
/// # Errors
///
/// Returns [`SentryError::Git`] if the repository cannot be opened or
/// either revision does not resolve to a commit.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use diffsentry_git::diff_between;
///
/// let set = diff_between(Path::new("."), "HEAD~1", "HEAD").unwrap();
/// println!("{} files changed by {}", set.len(), set.author);
/// ```
pub fn diff_between(repo_path: &Path, rev1: &str, rev2: &str) -> Result<DiffSet, SentryError> {
    let repo = open(repo_path)?;
    let old = resolve_commit(&repo, rev1)?;
    let new = resolve_commit(&repo, rev2)?;

    let old_tree = old
        .tree()
        .map_err(|e| SentryError::Git(format!("failed to get tree for '{rev1}': {e}")))?;
    let new_tree = new
        .tree()
        .map_err(|e| SentryError::Git(format!("failed to get tree for '{rev2}': {e}")))?;

    let mut diff_opts = DiffOptions::new();
    let diff = repo
        .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))
        .map_err(|e| SentryError::Git(format!("failed to compute diff: {e}")))?;

    build_diff_set(&new, diff)
}

fn open(repo_path: &Path) -> Result<Repository, SentryError> {
    log::debug!("opening repository at {}", repo_path.display());
    Repository::open(repo_path).map_err(|e| {
        SentryError::Git(format!(
            "failed to open repository at {}: {e}",
            repo_path.display()
        ))
    })
}

fn resolve_commit<'r>(repo: &'r Repository, rev: &str) -> Result<Commit<'r>, SentryError> {
    repo.revparse_single(rev)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(|e| SentryError::Git(format!("failed to resolve commit '{rev}': {e}")))
}

fn build_diff_set(commit: &Commit<'_>, mut diff: Diff<'_>) -> Result<DiffSet, SentryError> {
    // Copies are only reported once similarity detection runs.
    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true).copies(true);
    diff.find_similar(Some(&mut find_opts))
        .map_err(|e| SentryError::Git(format!("failed to detect renames and copies: {e}")))?;

    let mut diffs = Vec::with_capacity(diff.deltas().len());
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let status = classify_delta(delta.status());

        let side = if status == FileStatus::Created {
            delta.new_file()
        } else {
            delta.old_file()
        };
        let Some(path) = side.path().map(Path::to_path_buf) else {
            continue;
        };

        let text = match Patch::from_diff(&diff, idx)
            .map_err(|e| SentryError::Git(format!("failed to build patch: {e}")))?
        {
            Some(mut patch) => {
                let buf = patch
                    .to_buf()
                    .map_err(|e| SentryError::Git(format!("failed to render patch: {e}")))?;
                String::from_utf8_lossy(&buf).into_owned()
            }
            // Unchanged or binary entries have no textual patch.
            None => String::new(),
        };

        diffs.push(FileDiff {
            diff: text,
            path,
            status,
        });
    }

    let author = commit.author();
    let set = DiffSet {
        author: author.name().unwrap_or("unknown").to_string(),
        email: author.email().unwrap_or("unknown").to_string(),
        date: commit_date(commit),
        diffs,
    };
    log::debug!("extracted {} changed files", set.len());
    Ok(set)
}

fn classify_delta(status: Delta) -> FileStatus {
    FileStatus::classify(
        status == Delta::Added,
        status == Delta::Deleted,
        status == Delta::Copied,
    )
}

fn commit_date(commit: &Commit<'_>) -> DateTime<FixedOffset> {
    let time = commit.time();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or(Utc.fix());
    offset
        .timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_map_to_statuses() {
        assert_eq!(classify_delta(Delta::Added), FileStatus::Created);
        assert_eq!(classify_delta(Delta::Deleted), FileStatus::Deleted);
        assert_eq!(classify_delta(Delta::Copied), FileStatus::Copied);
        assert_eq!(classify_delta(Delta::Modified), FileStatus::Modified);
        assert_eq!(classify_delta(Delta::Renamed), FileStatus::Modified);
        assert_eq!(classify_delta(Delta::Typechange), FileStatus::Modified);
    }

    #[test]
    fn missing_repository_is_git_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = working_tree_diff(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, SentryError::Git(_)));
        assert!(err.to_string().contains("failed to open repository"));
    }
}
