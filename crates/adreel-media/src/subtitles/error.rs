use thiserror::Error;

/// Malformed explicit subtitle input.
///
/// Always recoverable: the caller discards the track and uses the
/// placeholder instead.
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("cue #{index} has a negative length")]
    NegativeLength { index: usize },

    #[error("cue #{index} starts before the previous cue")]
    NonMonotonic { index: usize },

    #[error("cue #{index} overlaps the next cue")]
    Overlap { index: usize },

    #[error("cue #{index}: {message}")]
    InvalidCue { index: usize, message: String },

    #[error("malformed cue file: {0}")]
    Malformed(String),

    #[error("cannot read cue file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cue file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AlignmentError {
    pub fn invalid_cue(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidCue {
            index,
            message: message.into(),
        }
    }
}
