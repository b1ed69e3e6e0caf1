//! Pipeline error taxonomy for exit-code and HTTP status mapping.

/// Every way a pipeline run can fail, one variant per stage.
///
/// The HTTP layer maps input-side variants to 400 and everything past
/// the upload boundary to 500; the CLI maps them to distinct exit codes.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No file, wrong field, or a payload that is not usable as input
    #[error("invalid upload: {0}")]
    UploadInput(String),

    /// Corrupt archive, or an archive with no eligible entries
    #[error("archive error: {0}")]
    Archive(String),

    /// Transport failure talking to the model endpoint, retries exhausted
    #[error("AI request failed: {0}")]
    AiRequest(String),

    /// Model returned non-JSON or a structurally invalid reply
    #[error("AI response format error: {0}")]
    AiResponseFormat(String),

    /// Underlying stream error while producing the output archive
    #[error("archive write error: {0}")]
    ArchiveWrite(String),
}

/// Exit code mapping for the one-shot CLI path.
/// 0=success, 3=invalid input, 4=archive, 5=model transport, 6=model
/// reply shape, 7=archive write.
pub fn exit_code_for(e: &PipelineError) -> i32 {
    match e {
        PipelineError::UploadInput(_) => 3,
        PipelineError::Archive(_) => 4,
        PipelineError::AiRequest(_) => 5,
        PipelineError::AiResponseFormat(_) => 6,
        PipelineError::ArchiveWrite(_) => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let errs = [
            PipelineError::UploadInput("x".into()),
            PipelineError::Archive("x".into()),
            PipelineError::AiRequest("x".into()),
            PipelineError::AiResponseFormat("x".into()),
            PipelineError::ArchiveWrite("x".into()),
        ];

        let mut codes: Vec<i32> = errs.iter().map(exit_code_for).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
    }
}
