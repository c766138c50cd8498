use thiserror::Error;

/// Typed failures of the message pipeline.
///
/// Used at the pipeline boundary so the reply formatter can tell an
/// interpreter outage from a store rejection. Internal/leaf functions keep
/// using `anyhow::Result` — each variant carries only the underlying
/// error's message text, never a backtrace.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("interpretation failed: {0}")]
    Interpretation(String),

    #[error("transaction write failed: {0}")]
    Store(String),
}

impl PipelineError {
    /// The underlying message text, for embedding into a user-facing reply.
    pub fn detail(&self) -> &str {
        match self {
            Self::Interpretation(d) | Self::Store(d) => d,
        }
    }
}
