//! Two-tier form submission.

use crate::automation::{AutomationSession, SubmitTier};
use crate::error::{AcquisitionError, AcquisitionResult};

/// Tiers tried in order until one succeeds.
pub const SUBMIT_TIERS: [SubmitTier; 2] = [SubmitTier::Interactive, SubmitTier::Forced];

/// Submit the form, falling through [`SUBMIT_TIERS`]. Returns the tier that
/// worked, or `Submission` listing every tier's failure.
pub async fn submit_with_fallback(
    session: &mut dyn AutomationSession,
    label: &str,
    timeout_ms: u64,
) -> AcquisitionResult<SubmitTier> {
    let mut attempts = Vec::with_capacity(SUBMIT_TIERS.len());
    for tier in SUBMIT_TIERS {
        match session.submit(label, tier, timeout_ms).await {
            Ok(()) => {
                tracing::debug!(%tier, "form submitted");
                return Ok(tier);
            }
            Err(e) => {
                tracing::warn!(%tier, "submit tier failed: {e:#}");
                attempts.push(format!("{tier}: {e:#}"));
            }
        }
    }
    Err(AcquisitionError::Submission { attempts })
}
