//! Archive reading with allow/deny eligibility filtering.
//!
//! The uploaded ZIP is read entirely in memory; entries are filtered by
//! a fixed filename/extension policy and decoded as UTF-8 text. One bad
//! entry never fails the whole upload.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::core::error::PipelineError;
use crate::core::project::{ProjectFile, UploadResult};
use crate::infra::config::FilterConfig;

/// Compiled eligibility policy for project files.
///
/// Precedence: deny-list > special-filename allow-list > extension
/// allow-list. Directory rules (`node_modules`, `.git`, any dot-prefixed
/// directory) prune the whole subtree.
#[derive(Debug, Clone)]
pub struct FileFilter {
    allow_extensions: HashSet<String>,
    allow_filenames: HashSet<String>,
    deny_filenames: HashSet<String>,
    skip_dirs: HashSet<String>,
}

impl FileFilter {
    pub fn from_config(cfg: &FilterConfig) -> Self {
        let lower = |v: &[String]| {
            v.iter()
                .map(|s| s.to_lowercase())
                .collect::<HashSet<_>>()
        };

        Self {
            allow_extensions: lower(&cfg.allow_extensions),
            allow_filenames: lower(&cfg.allow_filenames),
            deny_filenames: lower(&cfg.deny_filenames),
            skip_dirs: lower(&cfg.skip_dirs),
        }
    }

    /// Decide eligibility for a forward-slash relative path.
    /// All comparisons are case-insensitive.
    pub fn is_eligible(&self, rel_path: &str) -> bool {
        let components: Vec<&str> = rel_path
            .split('/')
            .filter(|c| !c.is_empty())
            .collect();

        let Some((filename, dirs)) = components.split_last() else {
            return false;
        };

        for dir in dirs {
            // Dot-prefixed directories are vendored/VCS internals; never
            // descend into them.
            if dir.starts_with('.') || self.skip_dirs.contains(&dir.to_lowercase()) {
                return false;
            }
        }

        let name = filename.to_lowercase();

        if self.deny_filenames.contains(&name) {
            return false;
        }
        if self.allow_filenames.contains(&name) {
            return true;
        }

        extension_of(&name).is_some_and(|ext| self.allow_extensions.contains(ext))
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

/// Extension including the leading dot, lowercase input assumed.
/// Dotfiles (".env") have no extension here; they go through the
/// special-filename list instead.
fn extension_of(name: &str) -> Option<&str> {
    let idx = name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some(&name[idx..])
}

/// Read a ZIP byte stream and return the eligible entries as text files.
///
/// Fails with an archive error when the bytes are not a valid ZIP or
/// when no entry survives filtering. Unreadable or non-UTF-8 entries are
/// skipped individually and reported in `UploadResult::skipped`.
pub fn read_archive(bytes: &[u8], filter: &FileFilter) -> Result<UploadResult, PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::Archive(format!("not a valid ZIP archive: {e}")))?;

    let mut files = Vec::new();
    let mut skipped = Vec::new();

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable archive entry");
                skipped.push(format!("entry #{index}: {e}"));
                continue;
            }
        };

        if entry.is_dir() {
            continue;
        }

        // enclosed_name() rejects absolute and `..`-escaping names.
        let Some(name) = entry
            .enclosed_name()
            .map(|p| normalize_separators(&p))
        else {
            tracing::warn!(raw = entry.name(), "skipping entry with unsafe path");
            skipped.push(format!("{}: unsafe path", entry.name()));
            continue;
        };

        if !filter.is_eligible(&name) {
            continue;
        }

        let mut raw = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut raw) {
            tracing::warn!(file = %name, error = %e, "failed to read archive entry");
            skipped.push(format!("{name}: {e}"));
            continue;
        }

        match String::from_utf8(raw) {
            Ok(content) => files.push(ProjectFile { filename: name, content }),
            Err(_) => {
                tracing::warn!(file = %name, "skipping entry with non-UTF-8 content");
                skipped.push(format!("{name}: not valid UTF-8 text"));
            }
        }
    }

    if files.is_empty() {
        return Err(PipelineError::Archive(
            "the archive contains no eligible source files".to_string(),
        ));
    }

    Ok(UploadResult { files, skipped })
}

fn normalize_separators(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
