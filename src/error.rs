use thiserror::Error;

/// Everything that can go wrong in this crate. Dimension mismatches and
/// invalid allocation sizes are contract violations surfaced immediately;
/// nothing here is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("dimension mismatch: expected length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "range [{offset}, {offset}+{len}) does not fit in a destination of length {destination}"
    )]
    RangeOutOfBounds {
        offset: usize,
        len: usize,
        destination: usize,
    },

    #[error("a network needs at least two layers with at least one neuron each")]
    InvalidNetworkShape,

    #[error("standard deviation must be positive and finite, got {0}")]
    InvalidStandardDeviation(f64),

    #[error("cannot split {samples} samples into {groups} mini-batches")]
    InvalidGroupCount { groups: usize, samples: usize },

    #[error("image file reports a degenerate size of {rows} rows by {columns} columns")]
    InvalidImageSize { rows: u32, columns: u32 },

    #[error("image file reports {images} samples but label file reports {labels}")]
    SampleCountMismatch { images: u32, labels: u32 },

    #[error("{0} file ends before all samples are read")]
    TruncatedData(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
