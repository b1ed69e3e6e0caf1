//! Archive writer: serialize project files into an in-memory ZIP.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::error::PipelineError;
use crate::core::project::ProjectFile;

/// Write `files` into a ZIP byte buffer, entries in input order,
/// Deflate at maximum compression.
///
/// An empty input list yields a valid zero-entry archive: "no changes"
/// is not a failure. Entries without a filename are skipped with a
/// warning; only an underlying stream error fails the write.
pub fn write_archive(files: &[ProjectFile]) -> Result<Vec<u8>, PipelineError> {
    let mut cursor = Cursor::new(Vec::new());

    {
        let mut writer = ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9));

        for file in files {
            if file.filename.is_empty() {
                tracing::warn!("skipping archive entry with empty filename");
                continue;
            }

            writer
                .start_file(file.filename.as_str(), options)
                .map_err(|e| {
                    PipelineError::ArchiveWrite(format!(
                        "failed to start entry '{}': {e}",
                        file.filename
                    ))
                })?;
            writer.write_all(file.content.as_bytes()).map_err(|e| {
                PipelineError::ArchiveWrite(format!(
                    "failed to write entry '{}': {e}",
                    file.filename
                ))
            })?;
        }

        writer
            .finish()
            .map_err(|e| PipelineError::ArchiveWrite(format!("failed to finalize archive: {e}")))?;
    }

    Ok(cursor.into_inner())
}
