//! Error taxonomy for chart acquisition.

/// Failures surfaced by the engine, the remote agent and the orchestrator.
#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    /// Calendar fields outside their legal ranges. Never retried.
    #[error("invalid calendar moment: {0}")]
    InvalidMoment(String),

    /// Every submission tier failed. One reason per attempted tier, in order.
    #[error("form submission failed on every tier: {}", .attempts.join("; "))]
    Submission { attempts: Vec<String> },

    /// The result marker never showed up.
    #[error("result marker {marker:?} did not appear within {waited_ms}ms")]
    ExtractionTimeout { marker: String, waited_ms: u64 },

    /// Fewer than four valid pillar glyphs on the result surface.
    #[error("insufficient pillar data: found {} valid glyph(s) in {found:?}", .valid)]
    InsufficientData { found: Vec<String>, valid: usize },

    /// Remote strategy requested but no browser automation is configured.
    #[error("remote acquisition unavailable: {0}")]
    RemoteUnavailable(String),

    /// Lower-level browser or transport failure.
    #[error("automation error: {0:#}")]
    Automation(#[from] anyhow::Error),
}

impl AcquisitionError {
    /// Short machine-readable kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidMoment(_) => "invalid_moment",
            Self::Submission { .. } => "submission",
            Self::ExtractionTimeout { .. } => "extraction_timeout",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::Automation(_) => "automation",
        }
    }
}

pub type AcquisitionResult<T> = Result<T, AcquisitionError>;
