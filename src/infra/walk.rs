//! Gitignore-aware walker for ingesting a project directory.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Extra ignore globs (early prune + late filter)
//! - Vendored/VCS directories (`node_modules`, `.git`, any dot-prefixed
//!   directory) are pruned during traversal, while dotfiles such as
//!   `.env` remain visible
//! - Deterministic ordering for stable output and tests
//!
//! Backed by ripgrep's `ignore` crate and `globset`. Eligibility by
//! filename/extension is a separate concern; callers apply the same
//! `FileFilter` used for archive uploads to the relative paths this
//! walker returns.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Walker over a project directory on disk.
/// Extra globs are applied in two places:
///   1) Early: prune directories during traversal (filter_entry).
///   2) Late: filter out files that still slipped through.
pub struct ProjectWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Directory names never descended into, matched case-insensitively
    skip_dirs: HashSet<String>,
}

impl ProjectWalker
{
    /// Build a walker with extra ignore patterns (e.g. "dist/**") and
    /// the directory deny list shared with archive extraction.
    pub fn new(
        additional_ignores: &[String],
        skip_dirs: &[String],
    ) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            ignore_patterns: builder.build()?,
            skip_dirs: skip_dirs
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
        })
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // Dotfiles stay visible (.env, .gitignore are eligible uploads);
        // dot-prefixed *directories* are pruned in filter_entry below.
        b.hidden(false);

        // Respect .ignore/.gitignore/.git/info/exclude and global gitignore
        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);

        // Early directory pruning (fast short-circuit).
        let extra = self
            .ignore_patterns
            .clone();
        let skip = self
            .skip_dirs
            .clone();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            if !is_dir
            {
                return true;
            }

            if let Some(name) = ent
                .file_name()
                .to_str()
            {
                if name.starts_with('.') || skip.contains(&name.to_lowercase())
                {
                    return false;
                }
            }

            !extra.is_match(ent.path())
        });

        b
    }

    /// Traverse files under `root`, respecting ignore rules and extra
    /// globs. Returns a **sorted** list of file paths for determinism.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<PathBuf> = walker
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            // Late file-level extra ignore filtering using RELATIVE path
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
            })
            .collect();

        out.sort();

        out
    }
}

/// Path relative to `root`, normalized to forward slashes, the same
/// filename form used for archive entries.
pub fn relative_slash_path(
    root: &Path,
    path: &Path,
) -> String
{
    let rel = path
        .strip_prefix(root)
        .unwrap_or(path);

    rel.components()
        .map(|c| {
            c.as_os_str()
                .to_string_lossy()
        })
        .collect::<Vec<_>>()
        .join("/")
}
