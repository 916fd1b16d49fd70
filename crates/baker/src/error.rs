use lightcache::CacheError;

/// Failures that abort a bake job.
///
/// There is no retry anywhere in the pipeline: GPU work either succeeds or
/// is unrecoverable within the job. Cancellation is not an error; it is a
/// normal outcome reported through [`BakeOutcome`](crate::BakeOutcome).
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("scene evaluation failed: {0}")]
    Scene(#[source] anyhow::Error),

    #[error("probe render failed: {0}")]
    Render(#[source] anyhow::Error),

    /// The cell visiting order ran out before the scheduled sample index.
    /// This is a scheduling bug, not a recoverable condition.
    #[error("cell visiting order exhausted for grid {grid} at sample {sample}")]
    InvariantViolation { grid: u32, sample: u32 },

    #[error("probe set needs {samples} irradiance samples; the pool holds at most {max}")]
    CapacityExceeded { samples: u32, max: u32 },
}
