//! Merge model-proposed file operations into the project state.
//!
//! One policy, stated once: `created`/`modified` insert or overwrite
//! (last write wins, filename is the merge key), `deleted` removes the
//! key, `unchanged` never touches the map. Records that violate the
//! contract (missing content, deleting a file that is not there) are
//! skipped with a warning instead of failing the round.

use crate::core::project::{FileAction, FileOperation, ProjectState};

/// Result of one merge pass.
#[derive(Debug)]
pub struct MergeResult {
    /// State after applying every valid operation.
    pub state: ProjectState,
    /// The operations that actually changed the state, in input order.
    pub applied: Vec<FileOperation>,
    /// Notes for operations that were skipped.
    pub warnings: Vec<String>,
}

/// Merge `operations` into a working copy of `prior`. The prior state is
/// never partially updated: each filename is either set, removed, or
/// left untouched.
pub fn merge(prior: &ProjectState, operations: &[FileOperation]) -> MergeResult {
    let mut state = prior.clone();
    let mut applied = Vec::new();
    let mut warnings = Vec::new();

    for op in operations {
        match op.action {
            FileAction::Created | FileAction::Modified => match &op.content {
                Some(content) => {
                    state.insert(op.filename.clone(), content.clone());
                    applied.push(op.clone());
                }
                None => {
                    tracing::warn!(
                        file = %op.filename,
                        action = %op.action,
                        "operation carries no content, skipping"
                    );
                    warnings.push(format!(
                        "{}: marked '{}' but no content was provided",
                        op.filename, op.action
                    ));
                }
            },
            FileAction::Deleted => {
                // shift_remove keeps the insertion order of the rest
                if state.shift_remove(&op.filename).is_some() {
                    applied.push(op.clone());
                } else {
                    tracing::warn!(file = %op.filename, "delete of unknown file, skipping");
                    warnings.push(format!(
                        "{}: marked 'deleted' but not present in the project",
                        op.filename
                    ));
                }
            }
            // Unchanged files are never echoed back by contract; if one
            // shows up anyway it must not touch the map.
            FileAction::Unchanged => {}
        }
    }

    MergeResult { state, applied, warnings }
}

#[cfg(test)]
mod tests {
    use crate::core::project::state_from_files;
    use crate::core::project::ProjectFile;

    use super::*;

    fn base_state() -> ProjectState {
        state_from_files(&[
            ProjectFile { filename: "src/a.js".into(), content: "a".into() },
            ProjectFile { filename: "src/b.js".into(), content: "b".into() },
        ])
    }

    fn op(filename: &str, action: FileAction, content: Option<&str>) -> FileOperation {
        FileOperation {
            filename: filename.to_string(),
            content: content.map(str::to_string),
            action,
            explanation: None,
        }
    }

    #[test]
    fn empty_operations_leave_state_unchanged() {
        let prior = base_state();
        let result = merge(&prior, &[]);

        assert_eq!(result.state, prior);
        assert!(result.applied.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn modified_overwrites_and_created_appends() {
        let result = merge(
            &base_state(),
            &[
                op("src/a.js", FileAction::Modified, Some("a2")),
                op("src/new.js", FileAction::Created, Some("n")),
            ],
        );

        assert_eq!(result.state["src/a.js"], "a2");
        assert_eq!(result.state["src/new.js"], "n");
        assert_eq!(result.applied.len(), 2);

        // originals keep their slots, creations go to the back
        let order: Vec<&String> = result.state.keys().collect();
        assert_eq!(order, vec!["src/a.js", "src/b.js", "src/new.js"]);
    }

    #[test]
    fn last_write_wins_for_the_same_filename() {
        let result = merge(
            &base_state(),
            &[
                op("src/a.js", FileAction::Modified, Some("first")),
                op("src/a.js", FileAction::Modified, Some("second")),
            ],
        );

        assert_eq!(result.state["src/a.js"], "second");
    }

    #[test]
    fn deleted_removes_the_key() {
        let result = merge(&base_state(), &[op("src/a.js", FileAction::Deleted, None)]);

        assert!(!result.state.contains_key("src/a.js"));
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.state.len(), 1);
    }

    #[test]
    fn deleting_an_unknown_file_warns_instead_of_failing() {
        let prior = base_state();
        let result = merge(&prior, &[op("ghost.js", FileAction::Deleted, None)]);

        assert_eq!(result.state, prior);
        assert!(result.applied.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn missing_content_is_skipped_with_warning() {
        let prior = base_state();
        let result = merge(&prior, &[op("src/a.js", FileAction::Modified, None)]);

        assert_eq!(result.state, prior);
        assert!(result.applied.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("src/a.js"));
    }

    #[test]
    fn unchanged_never_touches_the_map() {
        let prior = base_state();
        let result = merge(
            &prior,
            &[op("src/a.js", FileAction::Unchanged, Some("should be ignored"))],
        );

        assert_eq!(result.state, prior);
        assert!(result.applied.is_empty());
    }
}
