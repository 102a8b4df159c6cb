//! Remote acquisition agent — obtain a chart by driving the external
//! calculation form in an automated browser session.
//!
//! Protocol per acquisition:
//! 1. Open a fresh session and navigate to the entry page.
//! 2. Fill the form by direct field assignment with short settling delays.
//! 3. Submit through the interactive tier, then the forced tier.
//! 4. Wait for the result marker.
//! 5. Extract through the container-scoped tier, then the global tier.
//! 6. Close the session on every path before returning. A cancelled
//!    acquisition hands its session to a background close.

pub mod extract;
pub mod form;
pub mod submit;

use crate::automation::{AutomationSession, SessionLauncher};
use crate::chart::FourPillarSet;
use crate::config::RuntimeConfig;
use crate::error::{AcquisitionError, AcquisitionResult};
use anyhow::Context;
use form::{ChartForm, SurfaceLayout};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Target and bounded waits of the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub base_url: String,
    pub layout: SurfaceLayout,
    pub navigation_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    pub marker_timeout_ms: u64,
    pub field_settle: Duration,
    pub submit_settle: Duration,
}

impl AgentConfig {
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        let t = &config.timeouts;
        Self {
            base_url: config.base_url.clone(),
            layout: SurfaceLayout::default(),
            navigation_timeout_ms: t.navigation_ms,
            submit_timeout_ms: t.submit_ms,
            marker_timeout_ms: t.marker_ms,
            field_settle: Duration::from_millis(t.field_settle_ms),
            submit_settle: Duration::from_millis(t.submit_settle_ms),
        }
    }
}

/// Owns an open session until it is released. Dropping a lease that still
/// holds its session (the acquisition future was cancelled) closes the
/// session on the current runtime in the background.
struct SessionLease {
    session: Option<Box<dyn AutomationSession>>,
}

impl SessionLease {
    fn new(session: Box<dyn AutomationSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn session_mut(&mut self) -> Option<&mut (dyn AutomationSession + 'static)> {
        self.session.as_deref_mut()
    }

    async fn release(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!("failed to release automation session: {e:#}");
            }
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("acquisition cancelled, releasing session in background");
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!("failed to release automation session: {e:#}");
                    }
                });
            }
            Err(_) => tracing::warn!("acquisition cancelled outside a runtime, session leaked"),
        }
    }
}

/// Drives the external surface to obtain four-pillar charts.
pub struct RemoteAcquisitionAgent {
    launcher: Arc<dyn SessionLauncher>,
    config: AgentConfig,
}

impl RemoteAcquisitionAgent {
    pub fn new(launcher: Arc<dyn SessionLauncher>, config: AgentConfig) -> Self {
        Self { launcher, config }
    }

    pub fn launcher(&self) -> &Arc<dyn SessionLauncher> {
        &self.launcher
    }

    /// Acquire one chart. The session is released before this returns,
    /// whatever the outcome.
    pub async fn acquire(&self, form: &ChartForm) -> AcquisitionResult<FourPillarSet> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("remote_acquisition", %id, subject = %form.name);
        self.acquire_with_session(form).instrument(span).await
    }

    async fn acquire_with_session(&self, form: &ChartForm) -> AcquisitionResult<FourPillarSet> {
        let session = self
            .launcher
            .open()
            .await
            .context("failed to open automation session")?;
        let mut lease = SessionLease::new(session);

        let outcome = match lease.session_mut() {
            Some(session) => self.drive(session, form).await,
            None => Err(anyhow::anyhow!("automation session already released").into()),
        };

        lease.release().await;

        match &outcome {
            Ok(chart) => tracing::info!(%chart, "remote acquisition succeeded"),
            Err(e) => tracing::warn!(kind = e.kind(), "remote acquisition failed: {e}"),
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn AutomationSession,
        form: &ChartForm,
    ) -> AcquisitionResult<FourPillarSet> {
        let cfg = &self.config;
        let layout = &cfg.layout;

        let nav = session
            .navigate(&cfg.base_url, cfg.navigation_timeout_ms)
            .await?;
        tracing::debug!(url = %nav.final_url, load_time_ms = nav.load_time_ms, "entry page loaded");

        let name_selector = format!("#{}", layout.name_field);
        if !session
            .wait_for_selector(&name_selector, cfg.navigation_timeout_ms)
            .await?
        {
            return Err(anyhow::anyhow!("form field {name_selector} never appeared").into());
        }

        form::populate(session, form, layout, cfg.field_settle).await?;
        tokio::time::sleep(cfg.submit_settle).await;

        submit::submit_with_fallback(session, &layout.submit_label, cfg.submit_timeout_ms).await?;

        if !session
            .wait_for_selector(&layout.result_marker, cfg.marker_timeout_ms)
            .await?
        {
            return Err(AcquisitionError::ExtractionTimeout {
                marker: layout.result_marker.clone(),
                waited_ms: cfg.marker_timeout_ms,
            });
        }

        extract::extract_pillars(session, layout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::scripted::{
        GlyphBlock, ResultSurface, ScriptedLauncher, ScriptedSurface,
    };
    use crate::automation::NoopLauncher;
    use crate::calendar::CalendarMoment;

    fn test_config() -> AgentConfig {
        AgentConfig {
            base_url: "https://calc.test/form".into(),
            layout: SurfaceLayout::default(),
            navigation_timeout_ms: 100,
            submit_timeout_ms: 100,
            marker_timeout_ms: 100,
            field_settle: Duration::from_millis(1),
            submit_settle: Duration::from_millis(1),
        }
    }

    fn agent(surface: ScriptedSurface) -> (RemoteAcquisitionAgent, Arc<ScriptedLauncher>) {
        let launcher = Arc::new(ScriptedLauncher::new(surface));
        let agent = RemoteAcquisitionAgent::new(launcher.clone(), test_config());
        (agent, launcher)
    }

    fn golden_form() -> ChartForm {
        ChartForm::new(Some("王小明"), form::Sex::Female, CalendarMoment::new(1987, 5, 20, 10, 30))
    }

    #[tokio::test]
    async fn test_acquire_fills_form_and_extracts() {
        let (agent, launcher) = agent(ScriptedSurface::default());
        let chart = agent.acquire(&golden_form()).await.unwrap();
        assert_eq!(chart.to_string(), "丁卯 乙巳 己巳 己巳");

        let log = launcher.log();
        assert_eq!(log.navigations, vec!["https://calc.test/form"]);
        let submitted = &log.submissions[0];
        assert_eq!(submitted.fields["_Name"], "王小明");
        assert_eq!(submitted.fields["_Year"], "1987");
        assert_eq!(submitted.fields["_Min"], "30");
        assert_eq!(submitted.radios["_Sex"], "0");
        assert_eq!(submitted.radios["_YearMode"], "1");
        assert_eq!((log.opened, log.closed), (1, 1));
        assert_eq!(launcher.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_form_without_time_fields_still_submits() {
        let (agent, launcher) = agent(ScriptedSurface {
            has_time_fields: false,
            ..Default::default()
        });
        // The service then computes for 00:00, still the same day.
        let chart = agent.acquire(&golden_form()).await.unwrap();
        assert_eq!(chart.day.code(), "己巳");
        assert!(!launcher.log().submissions[0].fields.contains_key("_Hour"));
    }

    #[tokio::test]
    async fn test_submission_failure_releases_session_once() {
        let (agent, launcher) = agent(ScriptedSurface {
            interactive_submit_fails: true,
            forced_submit_fails: true,
            ..Default::default()
        });
        let err = agent.acquire(&golden_form()).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Submission { .. }));
        let log = launcher.log();
        assert_eq!(log.closed, 1);
        assert!(log.submissions.is_empty());
    }

    #[tokio::test]
    async fn test_marker_timeout() {
        let (agent, launcher) = agent(ScriptedSurface {
            result: ResultSurface::NeverRenders,
            ..Default::default()
        });
        let err = agent.acquire(&golden_form()).await.unwrap_err();
        match err {
            AcquisitionError::ExtractionTimeout { marker, waited_ms } => {
                assert_eq!(marker, "span.w-blue");
                assert_eq!(waited_ms, 100);
            }
            other => panic!("expected ExtractionTimeout, got {other:?}"),
        }
        assert_eq!(launcher.log().closed, 1);
    }

    #[tokio::test]
    async fn test_insufficient_data_releases_session() {
        let (agent, launcher) = agent(ScriptedSurface {
            result: ResultSurface::Fixed(vec![GlyphBlock::loose(&["甲子", "乙丑", "丙寅"])]),
            ..Default::default()
        });
        let err = agent.acquire(&golden_form()).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::InsufficientData { valid: 3, .. }));
        assert_eq!(launcher.log().closed, 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_wrapped() {
        let (agent, launcher) = agent(ScriptedSurface {
            navigation_fails: true,
            ..Default::default()
        });
        let err = agent.acquire(&golden_form()).await.unwrap_err();
        assert_eq!(err.kind(), "automation");
        assert_eq!(launcher.log().closed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_acquisition_still_releases_session() {
        let (agent, launcher) = agent(ScriptedSurface {
            latency: Duration::from_millis(50),
            ..Default::default()
        });
        // Dropped while the entry page is still loading.
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), agent.acquire(&golden_form())).await;
        assert!(cancelled.is_err());
        assert_eq!(launcher.log().opened, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(launcher.log().closed, 1);
        assert_eq!(launcher.active_sessions(), 0);
        assert!(launcher.log().submissions.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_browser() {
        let agent = RemoteAcquisitionAgent::new(Arc::new(NoopLauncher), test_config());
        let err = agent.acquire(&golden_form()).await.unwrap_err();
        assert!(err.to_string().contains("failed to open automation session"));
    }
}
