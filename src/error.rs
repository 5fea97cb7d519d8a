use thiserror::Error;

use crate::generator::GeneratorError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every repair stage failed. Carries the raw model text for diagnostics.
    #[error("model output could not be parsed as JSON ({} bytes)", raw.len())]
    UnparseableOutput { raw: String },

    #[error("model output does not match the expected schema at `{path}`: expected {expected}")]
    SchemaMismatch { path: String, expected: &'static str },

    #[error("generator call failed: {0}")]
    GeneratorFailure(#[from] GeneratorError),

    #[error("failed to encode prompt payload: {0}")]
    PromptEncoding(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn schema_mismatch(path: impl Into<String>, expected: &'static str) -> Self {
        PipelineError::SchemaMismatch {
            path: path.into(),
            expected,
        }
    }
}
