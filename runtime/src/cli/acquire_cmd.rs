//! `pillar acquire` — subject and reference charts through the orchestrator.

use super::output;
use crate::agent::{AgentConfig, RemoteAcquisitionAgent};
use crate::automation::chromium::ChromiumLauncher;
use crate::automation::SessionLauncher;
use crate::config::RuntimeConfig;
use crate::orchestrator::clock::SystemClock;
use crate::orchestrator::{AcquisitionOrchestrator, Strategy, SubjectRequest};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Give the orchestrator a remote agent over `launched`. When the browser
/// could not be launched the orchestrator stays agent-less, so remote
/// requests fail as `RemoteUnavailable`.
fn attach_launcher(
    orchestrator: AcquisitionOrchestrator,
    launched: Result<Arc<dyn SessionLauncher>>,
    config: &RuntimeConfig,
) -> (AcquisitionOrchestrator, Option<Arc<dyn SessionLauncher>>) {
    match launched {
        Ok(launcher) => {
            info!("Chromium launcher ready");
            let agent =
                RemoteAcquisitionAgent::new(Arc::clone(&launcher), AgentConfig::from_runtime(config));
            (orchestrator.with_agent(Arc::new(agent)), Some(launcher))
        }
        Err(e) => {
            warn!("Failed to initialize Chromium: {e:#}");
            (orchestrator, None)
        }
    }
}

/// Run the acquire command.
pub async fn run(subject: SubjectRequest, strategy: Strategy) -> Result<()> {
    let config = RuntimeConfig::from_env()?;
    let clock = Arc::new(SystemClock::new(config.utc_offset_minutes));
    let mut orchestrator =
        AcquisitionOrchestrator::new(clock).with_utc_offset(config.utc_offset_minutes);

    let mut launcher = None;
    if strategy == Strategy::Remote {
        let launched = ChromiumLauncher::launch(&config.browser)
            .await
            .map(|l| Arc::new(l) as Arc<dyn SessionLauncher>);
        (orchestrator, launcher) = attach_launcher(orchestrator, launched, &config);
    }

    let result = orchestrator.acquire(&subject, strategy).await;

    if let Some(l) = launcher {
        if let Err(e) = l.shutdown().await {
            warn!("browser shutdown failed: {e:#}");
        }
    }

    let pair = match result {
        Ok(pair) => pair,
        Err(e) => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "error": true,
                    "kind": e.kind(),
                    "message": e.to_string(),
                }));
                std::process::exit(1);
            }
            return Err(e.into());
        }
    };

    if output::is_json() {
        output::print_json(&serde_json::to_value(&pair)?);
        return Ok(());
    }

    println!("Subject   ({}): {}", pair.subject_moment, pair.subject);
    println!(
        "Reference ({}): {}{}",
        pair.reference_moment,
        pair.reference,
        if pair.reference_cached { "  [cached]" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::form::Sex;
    use crate::automation::scripted::{ScriptedLauncher, ScriptedSurface};
    use crate::error::AcquisitionError;
    use crate::orchestrator::clock::FixedClock;
    use chrono::DateTime;

    fn orchestrator() -> AcquisitionOrchestrator {
        let now = DateTime::parse_from_rfc3339("2025-01-01T09:00:00+08:00").unwrap();
        AcquisitionOrchestrator::new(Arc::new(FixedClock::new(now)))
    }

    fn subject() -> SubjectRequest {
        SubjectRequest {
            name: None,
            sex: Sex::Male,
            year: 1987,
            month: 5,
            day: 20,
            hour: 10,
            minute: 30,
        }
    }

    #[tokio::test]
    async fn test_failed_launch_reports_remote_unavailable() {
        let config = RuntimeConfig::default();
        let (orch, launcher) = attach_launcher(
            orchestrator(),
            Err(anyhow::anyhow!("Chromium not found")),
            &config,
        );
        assert!(launcher.is_none());
        let err = orch.acquire(&subject(), Strategy::Remote).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::RemoteUnavailable(_)));
        assert_eq!(err.kind(), "remote_unavailable");
    }

    #[tokio::test]
    async fn test_launched_browser_gets_an_agent() {
        let config = RuntimeConfig::default();
        let scripted = Arc::new(ScriptedLauncher::new(ScriptedSurface::default()));
        let launched: Arc<dyn SessionLauncher> = scripted.clone();
        let (orch, launcher) = attach_launcher(orchestrator(), Ok(launched), &config);
        assert!(launcher.is_some());

        let pair = orch.acquire(&subject(), Strategy::Remote).await.unwrap();
        assert_eq!(pair.subject.to_string(), "丁卯 乙巳 己巳 己巳");
        assert_eq!(scripted.log().opened, 2);
    }
}
