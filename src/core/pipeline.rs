//! End-to-end fix pipeline: bundle → model call → reconcile.
//!
//! `run_fix` is the shared sequential core used by both the HTTP
//! handlers and the one-shot CLI path in `run`. Each invocation is
//! stateless and independent; there is no fan-out and no cancellation
//! once a round is in flight.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use owo_colors::OwoColorize;

use crate::cli::{AppContext, FixArgs};
use crate::core::archive::write_archive;
use crate::core::bundle::build_bundle;
use crate::core::error::PipelineError;
use crate::core::extract::{FileFilter, read_archive};
use crate::core::gateway::AiGateway;
use crate::core::project::{
    FileAction, FixOutcome, ProjectFile, ProjectState, UploadResult, state_from_files,
    state_to_files,
};
use crate::core::reconcile;
use crate::infra::config::{Config, load_config};
use crate::infra::walk::{ProjectWalker, relative_slash_path};

/// One refinement round over an in-memory project state.
pub async fn run_fix(
    gateway: &AiGateway,
    prior: &ProjectState,
    instruction: &str,
) -> Result<FixOutcome, PipelineError> {
    let files = state_to_files(prior);
    let bundle = build_bundle(&files);

    let reply = gateway.complete(&bundle, instruction).await?;
    let merged = reconcile::merge(prior, &reply.file_operations);

    Ok(FixOutcome {
        file_changes: merged.applied,
        suggested_changes: reply.suggested_changes,
        updated_state: merged.state,
        warnings: merged.warnings,
    })
}

/// CLI entry: ingest a ZIP, a single file, or a directory; run one fix
/// round; write the patched archive next to the caller.
pub fn run(args: FixArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;

    let api_key = std::env::var("GEMINI_API_KEY").context(
        "GEMINI_API_KEY is not set; export it before running a fix round",
    )?;

    let mut gateway_cfg = config.gateway.clone();
    if let Some(model) = &args.model {
        gateway_cfg.model = model.clone();
    }
    let gateway = AiGateway::new(api_key, &gateway_cfg)?;
    let filter = FileFilter::from_config(&config.filter);

    let input = PathBuf::from(shellexpand::tilde(&args.input).into_owned());
    let upload = ingest(&input, &filter, &config, ctx)?;

    if !ctx.quiet {
        println!(
            "{} Collected {} file(s) from {}",
            "✓".green(),
            upload.files.len(),
            input.display()
        );
        for note in &upload.skipped {
            println!("  {} skipped {}", "!".yellow(), note);
        }
    }

    let state = state_from_files(&upload.files);
    let instruction = args.prompt.clone().unwrap_or_default();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let outcome = runtime.block_on(run_fix(&gateway, &state, &instruction))?;

    let output = match &args.output {
        Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
        None => PathBuf::from(format!(
            "fixed-project-{}.zip",
            Local::now().format("%Y%m%d-%H%M%S")
        )),
    };

    let bytes = write_archive(&state_to_files(&outcome.updated_state))?;
    std::fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if !ctx.quiet {
        print_summary(&outcome, &output);
    }

    Ok(())
}

/// Read project files from a path: ZIP archives and directories go
/// through the shared eligibility filter; a bare file is taken as-is.
fn ingest(
    path: &Path,
    filter: &FileFilter,
    config: &Config,
    ctx: &AppContext,
) -> Result<UploadResult> {
    if !path.exists() {
        anyhow::bail!("input path {} does not exist", path.display());
    }

    if path.is_dir() {
        return ingest_directory(path, filter, config, ctx);
    }

    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));

    if is_zip {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(read_archive(&bytes, filter)?);
    }

    // Single-file mode mirrors the upload-single endpoint: no
    // eligibility check, the caller chose this file explicitly.
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("{} is not readable UTF-8 text", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("input path has no filename")?;

    Ok(UploadResult {
        files: vec![ProjectFile { filename, content }],
        skipped: Vec::new(),
    })
}

fn ingest_directory(
    root: &Path,
    filter: &FileFilter,
    config: &Config,
    ctx: &AppContext,
) -> Result<UploadResult> {
    let walker = ProjectWalker::new(&[], &config.filter.skip_dirs)?;
    let paths = walker.walk_files(root);

    let progress = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(paths.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    };

    let mut files = Vec::new();
    let mut skipped = Vec::new();

    for path in &paths {
        progress.inc(1);

        let rel = relative_slash_path(root, path);
        if !filter.is_eligible(&rel) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => files.push(ProjectFile { filename: rel, content }),
            Err(e) => {
                tracing::warn!(file = %rel, error = %e, "failed to read project file");
                skipped.push(format!("{rel}: {e}"));
            }
        }
    }

    progress.finish_and_clear();

    if files.is_empty() {
        anyhow::bail!(
            "no eligible source files found under {}",
            root.display()
        );
    }

    Ok(UploadResult { files, skipped })
}

fn print_summary(outcome: &FixOutcome, output: &Path) {
    let counts = outcome
        .file_changes
        .iter()
        .counts_by(|op| op.action);
    let count_of = |action: FileAction| counts.get(&action).copied().unwrap_or(0);

    println!(
        "{} {} change(s) applied ({} created, {} modified, {} deleted)",
        "✓".green(),
        outcome.file_changes.len(),
        count_of(FileAction::Created),
        count_of(FileAction::Modified),
        count_of(FileAction::Deleted),
    );

    for op in &outcome.file_changes {
        let tag = match op.action {
            FileAction::Created => "created".green().to_string(),
            FileAction::Modified => "modified".cyan().to_string(),
            FileAction::Deleted => "deleted".red().to_string(),
            FileAction::Unchanged => "unchanged".to_string(),
        };
        match &op.explanation {
            Some(explanation) => println!("  {tag} {}: {explanation}", op.filename),
            None => println!("  {tag} {}", op.filename),
        }
    }

    for warning in &outcome.warnings {
        println!("  {} {warning}", "!".yellow());
    }

    if !outcome.suggested_changes.is_empty() {
        println!("{}", "Suggested follow-ups:".bold());
        for suggestion in &outcome.suggested_changes {
            println!("  - {suggestion}");
        }
    }

    println!(
        "{} Wrote patched archive to {}",
        "✓".green(),
        output.display()
    );
}
