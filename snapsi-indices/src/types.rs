use faer::Mat;

use crate::labeled::LabeledArray;

/// Error types for index computations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("degenerate weight: {0}")]
    DegenerateWeight(String),

    #[error("SVD computation failed: {0}")]
    SvdFailed(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Name of the mode axis in EOF outputs.
pub const MODE: &str = "mode";

/// Factors of the decomposition of one `time × points` slice.
#[derive(Debug, Clone)]
pub struct SvdModes {
    /// Left singular vectors (m × k), orthonormal columns.
    pub u: Mat<f64>,
    /// Singular values (k), descending.
    pub s: Vec<f64>,
    /// Right singular vectors (n × k).
    pub v: Mat<f64>,
    /// Principal components (m × k), unit variance over time.
    pub pc: Mat<f64>,
    /// Spatial patterns (n × k), scaled so that `pc · patternsᵗ` reproduces the input.
    pub patterns: Mat<f64>,
    /// Fraction of variance explained per mode (k), sums to 1.
    pub explained: Vec<f64>,
}

impl SvdModes {
    /// Number of modes `k = min(m, n)`.
    pub fn n_modes(&self) -> usize {
        self.s.len()
    }
}

/// Output of the EOF analysis.
///
/// Axes: `pc` is (extra..., time, mode), `eof` is (extra..., spatial..., mode),
/// `expl` is (extra..., mode). Mode 0 is the dominant pattern.
#[derive(Debug, Clone)]
pub struct EofDataset {
    pub pc: LabeledArray,
    pub eof: LabeledArray,
    pub expl: LabeledArray,
}

/// A single mode of an [`EofDataset`], with the mode axis removed.
#[derive(Debug, Clone)]
pub struct EofMode {
    pub pc: LabeledArray,
    pub eof: LabeledArray,
    pub expl: LabeledArray,
}

impl EofDataset {
    /// Number of modes.
    pub fn n_modes(&self) -> usize {
        self.expl.axis(MODE).map(|a| a.len()).unwrap_or(0)
    }

    /// Select mode `j`.
    pub fn mode(&self, j: usize) -> Result<EofMode, IndexError> {
        Ok(EofMode {
            pc: self.pc.index_axis(MODE, j)?,
            eof: self.eof.index_axis(MODE, j)?,
            expl: self.expl.index_axis(MODE, j)?,
        })
    }

    /// The dominant mode.
    pub fn leading(&self) -> Result<EofMode, IndexError> {
        self.mode(0)
    }
}

/// Index series with the pattern it was projected on, both sign-corrected.
#[derive(Debug, Clone)]
pub struct IndexSeries {
    pub series: LabeledArray,
    pub pattern: LabeledArray,
}
