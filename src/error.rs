use thiserror::Error;

/// Fatal errors. Per-pair degeneracies (no features, too few matches, a
/// failed homography fit) are not errors; they show up as `None` fields in
/// the pair metrics.
#[derive(Debug, Error)]
pub enum MovementError {
    #[error("feature algorithm '{0}' is not available in this build")]
    AlgorithmUnavailable(&'static str),

    #[error("at least 2 frames are required, got {0}")]
    TooFewFrames(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
