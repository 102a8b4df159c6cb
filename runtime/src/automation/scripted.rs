//! In-memory calculation surface for exercising the agent without a browser.
//!
//! A [`ScriptedLauncher`] hands out sessions that behave like the real form:
//! fields can be assigned, submission can be made to fail per tier, and the
//! result surface is either a fixed glyph layout or a chart rendered by the
//! local engine from whatever was submitted. Every session records what it
//! saw in a shared [`ScriptLog`].

use super::{AutomationSession, GlyphQuery, NavigationResult, SessionLauncher, SubmitTier};
use crate::calendar::{CalendarConversionEngine, CalendarMoment};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A block of marker glyphs, optionally wrapped in a labelled container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphBlock {
    /// Text of the enclosing container; `None` for loose glyphs.
    pub container_text: Option<String>,
    pub glyphs: Vec<String>,
}

impl GlyphBlock {
    pub fn contained(text: &str, glyphs: &[&str]) -> Self {
        Self {
            container_text: Some(text.to_string()),
            glyphs: glyphs.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn loose(glyphs: &[&str]) -> Self {
        Self {
            container_text: None,
            glyphs: glyphs.iter().map(|g| g.to_string()).collect(),
        }
    }
}

/// What the result surface shows after a successful submission.
#[derive(Debug, Clone)]
pub enum ResultSurface {
    /// The same layout regardless of input.
    Fixed(Vec<GlyphBlock>),
    /// A "四柱" container with the chart of the submitted moment.
    Computed,
    /// The result marker never appears.
    NeverRenders,
}

/// Behaviour of the simulated service.
#[derive(Debug, Clone)]
pub struct ScriptedSurface {
    pub result: ResultSurface,
    /// Whether the form exposes `_Hour` and `_Min`.
    pub has_time_fields: bool,
    pub interactive_submit_fails: bool,
    pub forced_submit_fails: bool,
    pub navigation_fails: bool,
    /// Delay applied to every step, to let concurrent callers interleave.
    pub latency: Duration,
}

impl Default for ScriptedSurface {
    fn default() -> Self {
        Self {
            result: ResultSurface::Computed,
            has_time_fields: true,
            interactive_submit_fails: false,
            forced_submit_fails: false,
            navigation_fails: false,
            latency: Duration::ZERO,
        }
    }
}

/// One submitted form as seen by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedForm {
    pub fields: BTreeMap<String, String>,
    pub radios: BTreeMap<String, String>,
    pub tier: SubmitTier,
}

/// Shared record of everything the scripted sessions did.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    pub opened: usize,
    pub closed: usize,
    pub navigations: Vec<String>,
    pub submit_attempts: Vec<SubmitTier>,
    pub submissions: Vec<SubmittedForm>,
}

impl ScriptLog {
    /// Submissions whose `_Name` field equals `name`.
    pub fn submissions_named(&self, name: &str) -> usize {
        self.submissions
            .iter()
            .filter(|s| s.fields.get("_Name").map(String::as_str) == Some(name))
            .count()
    }
}

/// Launcher producing [`ScriptedSession`]s.
pub struct ScriptedLauncher {
    surface: ScriptedSurface,
    log: Arc<Mutex<ScriptLog>>,
    active: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub fn new(surface: ScriptedSurface) -> Self {
        Self {
            surface,
            log: Arc::new(Mutex::new(ScriptLog::default())),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Snapshot of the shared log.
    pub fn log(&self) -> ScriptLog {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn open(&self) -> Result<Box<dyn AutomationSession>> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).opened += 1;
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            surface: self.surface.clone(),
            log: Arc::clone(&self.log),
            active: Arc::clone(&self.active),
            loaded: false,
            fields: BTreeMap::new(),
            radios: BTreeMap::new(),
            rendered: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// A simulated tab on the calculation surface.
pub struct ScriptedSession {
    surface: ScriptedSurface,
    log: Arc<Mutex<ScriptLog>>,
    active: Arc<AtomicUsize>,
    loaded: bool,
    fields: BTreeMap<String, String>,
    radios: BTreeMap<String, String>,
    rendered: Option<Vec<GlyphBlock>>,
}

impl ScriptedSession {
    async fn step(&self) {
        if !self.surface.latency.is_zero() {
            tokio::time::sleep(self.surface.latency).await;
        }
    }

    fn record<F: FnOnce(&mut ScriptLog)>(&self, f: F) {
        f(&mut self.log.lock().unwrap_or_else(|e| e.into_inner()));
    }

    fn field_u32(&self, id: &str) -> Result<u32> {
        match self.fields.get(id) {
            Some(v) => v.parse().with_context(|| format!("field {id} is not a number: {v:?}")),
            None => Ok(0),
        }
    }

    fn render(&self) -> Result<Option<Vec<GlyphBlock>>> {
        Ok(match &self.surface.result {
            ResultSurface::NeverRenders => None,
            ResultSurface::Fixed(blocks) => Some(blocks.clone()),
            ResultSurface::Computed => {
                let year = self
                    .fields
                    .get("_Year")
                    .context("_Year was never set")?
                    .parse::<i32>()
                    .context("_Year is not a number")?;
                let moment = CalendarMoment::new(
                    year,
                    self.field_u32("_Month")?,
                    self.field_u32("_Day")?,
                    self.field_u32("_Hour")?,
                    self.field_u32("_Min")?,
                );
                let chart = CalendarConversionEngine::new()
                    .convert(&moment)
                    .map_err(|e| anyhow::anyhow!("service rejected input: {e}"))?;
                let codes = chart.codes();
                let glyphs: Vec<&str> = codes.iter().map(String::as_str).collect();
                Some(vec![
                    GlyphBlock::contained("命主資料", &[]),
                    GlyphBlock::contained("四柱八字", &glyphs),
                ])
            }
        })
    }
}

#[async_trait]
impl AutomationSession for ScriptedSession {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.step().await;
        self.record(|log| log.navigations.push(url.to_string()));
        if self.surface.navigation_fails {
            bail!("navigation failed: connection refused");
        }
        self.loaded = true;
        self.fields.clear();
        self.radios.clear();
        self.rendered = None;
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: self.surface.latency.as_millis() as u64,
        })
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout_ms: u64) -> Result<bool> {
        self.step().await;
        if !self.loaded {
            return Ok(false);
        }
        if selector.starts_with('#') {
            return Ok(self.rendered.is_none());
        }
        Ok(self.rendered.is_some())
    }

    async fn set_field(&mut self, id: &str, value: &str) -> Result<bool> {
        if !self.loaded {
            bail!("no document loaded");
        }
        if !self.surface.has_time_fields && (id == "_Hour" || id == "_Min") {
            return Ok(false);
        }
        self.fields.insert(id.to_string(), value.to_string());
        Ok(true)
    }

    async fn check_radio(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.loaded {
            bail!("no document loaded");
        }
        self.radios.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn submit(&mut self, _label: &str, tier: SubmitTier, timeout_ms: u64) -> Result<()> {
        self.step().await;
        self.record(|log| log.submit_attempts.push(tier));
        let fails = match tier {
            SubmitTier::Interactive => self.surface.interactive_submit_fails,
            SubmitTier::Forced => self.surface.forced_submit_fails,
        };
        if fails {
            match tier {
                SubmitTier::Interactive => {
                    bail!("submit control not interactable within {timeout_ms}ms")
                }
                SubmitTier::Forced => bail!("submit control not found"),
            }
        }

        let form = SubmittedForm {
            fields: self.fields.clone(),
            radios: self.radios.clone(),
            tier,
        };
        self.record(|log| log.submissions.push(form));
        self.rendered = self.render()?;
        Ok(())
    }

    async fn collect_glyphs(&mut self, query: &GlyphQuery) -> Result<Vec<String>> {
        let blocks = self.rendered.as_deref().unwrap_or_default();
        let glyphs = match query {
            GlyphQuery::Scoped {
                required_markers, ..
            } => blocks
                .iter()
                .find(|b| {
                    b.container_text
                        .as_deref()
                        .is_some_and(|t| required_markers.iter().all(|m| t.contains(m.as_str())))
                })
                .map(|b| b.glyphs.clone())
                .unwrap_or_default(),
            GlyphQuery::Global { .. } => blocks.iter().flat_map(|b| b.glyphs.clone()).collect(),
        };
        Ok(glyphs.into_iter().map(|g| g.trim().to_string()).collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.record(|log| log.closed += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_computed_surface_renders_submitted_moment() {
        let launcher = ScriptedLauncher::new(ScriptedSurface::default());
        let mut s = launcher.open().await.unwrap();
        s.navigate("https://calc.test/", 1_000).await.unwrap();
        for (id, v) in [("_Year", "1987"), ("_Month", "5"), ("_Day", "20"), ("_Hour", "10"), ("_Min", "30")] {
            assert!(s.set_field(id, v).await.unwrap());
        }
        assert!(!s.wait_for_selector("span.w-blue", 10).await.unwrap());
        s.submit("確定送出", SubmitTier::Interactive, 10).await.unwrap();
        assert!(s.wait_for_selector("span.w-blue", 10).await.unwrap());

        let glyphs = s
            .collect_glyphs(&GlyphQuery::Scoped {
                container: "div.w10".into(),
                required_markers: vec!["四".into(), "柱".into()],
                leaf: "span.w-blue".into(),
            })
            .await
            .unwrap();
        assert_eq!(glyphs, vec!["丁卯", "乙巳", "己巳", "己巳"]);

        assert_eq!(launcher.active_sessions(), 1);
        s.close().await.unwrap();
        assert_eq!(launcher.active_sessions(), 0);
        assert_eq!(launcher.log().closed, 1);
    }

    #[tokio::test]
    async fn test_missing_time_fields() {
        let launcher = ScriptedLauncher::new(ScriptedSurface {
            has_time_fields: false,
            ..Default::default()
        });
        let mut s = launcher.open().await.unwrap();
        s.navigate("https://calc.test/", 1_000).await.unwrap();
        assert!(!s.set_field("_Hour", "10").await.unwrap());
        assert!(s.set_field("_Day", "1").await.unwrap());
        s.close().await.unwrap();
    }
}
