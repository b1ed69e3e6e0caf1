//! Project state and file-operation types shared across the pipeline.
//!
//! A project is an insertion-ordered map from forward-slash relative
//! filenames to UTF-8 text content. The map is only mutated by merging
//! model-proposed operations into it; every other stage treats it as
//! read-only input.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One file of the user's project, as extracted from an upload.
///
/// `filename` uses `/` separators regardless of host OS and is unique
/// within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub filename: String,
    pub content: String,
}

/// Materialized view of the user's files, keyed by filename.
/// Insertion order is meaningful: original files first, newly created
/// files appended in the order the model emitted them.
pub type ProjectState = IndexMap<String, String>;

/// What the model did to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Created,
    Modified,
    Unchanged,
    Deleted,
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileAction::Created => "created",
            FileAction::Modified => "modified",
            FileAction::Unchanged => "unchanged",
            FileAction::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A single file change proposed by the model.
///
/// `content` is required for `created`/`modified`; the reconciler skips
/// records that violate that with a warning instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOperation {
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    pub action: FileAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Outcome of reading an uploaded archive or a single file.
/// `skipped` carries human-readable notes for entries that were dropped
/// (unreadable, not UTF-8); it never causes the upload itself to fail.
#[derive(Debug, Default)]
pub struct UploadResult {
    pub files: Vec<ProjectFile>,
    pub skipped: Vec<String>,
}

/// Outcome of one AI refinement round.
#[derive(Debug)]
pub struct FixOutcome {
    /// Only the operations that were actually applied to the state.
    pub file_changes: Vec<FileOperation>,
    /// Free-text follow-up suggestions from the model.
    pub suggested_changes: Vec<String>,
    /// The full materialized state after the merge.
    pub updated_state: ProjectState,
    /// Per-record notes for operations that could not be applied.
    pub warnings: Vec<String>,
}

/// Build a state map from a file list. Duplicate filenames collapse to
/// the last occurrence (last write wins, same as the merge rule).
pub fn state_from_files(files: &[ProjectFile]) -> ProjectState {
    files
        .iter()
        .map(|f| (f.filename.clone(), f.content.clone()))
        .collect()
}

/// Flatten a state map back into a file list, preserving map order.
pub fn state_to_files(state: &ProjectState) -> Vec<ProjectFile> {
    state
        .iter()
        .map(|(filename, content)| ProjectFile {
            filename: filename.clone(),
            content: content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serde_is_lowercase() {
        let json = serde_json::to_string(&FileAction::Modified).unwrap();
        assert_eq!(json, "\"modified\"");

        let back: FileAction = serde_json::from_str("\"deleted\"").unwrap();
        assert_eq!(back, FileAction::Deleted);
    }

    #[test]
    fn operation_tolerates_missing_optional_fields() {
        let op: FileOperation =
            serde_json::from_str(r#"{"filename":"a.js","action":"unchanged"}"#).unwrap();
        assert_eq!(op.filename, "a.js");
        assert!(op.content.is_none());
        assert!(op.explanation.is_none());
    }

    #[test]
    fn state_round_trips_and_keeps_order() {
        let files = vec![
            ProjectFile { filename: "src/b.rs".into(), content: "b".into() },
            ProjectFile { filename: "src/a.rs".into(), content: "a".into() },
        ];

        let state = state_from_files(&files);
        assert_eq!(state_to_files(&state), files);
    }

    #[test]
    fn duplicate_filenames_collapse_to_last() {
        let files = vec![
            ProjectFile { filename: "a.js".into(), content: "first".into() },
            ProjectFile { filename: "a.js".into(), content: "second".into() },
        ];

        let state = state_from_files(&files);
        assert_eq!(state.len(), 1);
        assert_eq!(state["a.js"], "second");
    }
}
