//! Bundle builder: concatenate project files into one delimited blob
//! for embedding in the outbound model prompt.

use crate::core::project::ProjectFile;

/// Render files into the delimited bundle format, preserving input
/// order. No size capping happens here; the transport layer owns any
/// request-size limits.
pub fn build_bundle(files: &[ProjectFile]) -> String {
    // Rough pre-allocation: content plus delimiter overhead per file
    let capacity: usize = files
        .iter()
        .map(|f| f.content.len() + f.filename.len() * 2 + 48)
        .sum();

    let mut out = String::with_capacity(capacity);

    for file in files {
        out.push_str("### FILENAME: ");
        out.push_str(&file.filename);
        out.push('\n');
        out.push_str(&file.content);
        out.push('\n');
        out.push_str("### --- END OF ");
        out.push_str(&file.filename);
        out.push_str(" ---\n\n");
    }

    out
}
