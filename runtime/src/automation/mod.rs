//! Browser automation abstraction for the external calculation surface.
//!
//! Defines the `SessionLauncher` and `AutomationSession` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide). Each
//! session performs single mechanical steps; fallback ordering between
//! steps lives in the agent.

pub mod chromium;
pub mod script;
pub mod scripted;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken until the document reported ready, in milliseconds.
    pub load_time_ms: u64,
}

/// How the submit control is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmitTier {
    /// Wait until interactable, scroll into view, then click like a user.
    Interactive,
    /// Invoke the control's click action from page script.
    Forced,
}

impl fmt::Display for SubmitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive => f.write_str("interactive"),
            Self::Forced => f.write_str("forced"),
        }
    }
}

/// Where to look for chart glyphs on the result surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlyphQuery {
    /// Leaves inside the first `container` whose text holds every marker.
    Scoped {
        container: String,
        required_markers: Vec<String>,
        leaf: String,
    },
    /// Every matching leaf on the page, in document order.
    Global { leaf: String },
}

/// Opens automation sessions against a browser engine.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Open a fresh session (tab) with no cookies from earlier acquisitions.
    async fn open(&self) -> Result<Box<dyn AutomationSession>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of sessions opened and not yet closed.
    fn active_sessions(&self) -> usize;
}

/// One live interaction with the calculation surface.
#[async_trait]
pub trait AutomationSession: Send {
    /// Navigate and wait for the document to finish loading.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Wait until `selector` matches. `Ok(false)` when the wait ran out.
    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> Result<bool>;
    /// Assign a field value directly. `Ok(false)` when the page lacks the field.
    async fn set_field(&mut self, id: &str, value: &str) -> Result<bool>;
    /// Select the radio input `name` carrying `value`.
    async fn check_radio(&mut self, name: &str, value: &str) -> Result<()>;
    /// Activate the submit control labelled `label` using one tier.
    async fn submit(&mut self, label: &str, tier: SubmitTier, timeout_ms: u64) -> Result<()>;
    /// Text of every leaf matched by `query`, trimmed, in encountered order.
    async fn collect_glyphs(&mut self, query: &GlyphQuery) -> Result<Vec<String>>;
    /// Release the session and its browser resources.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A launcher used when Chromium is unavailable.
///
/// Local conversion still works; every remote acquisition fails at `open`.
pub struct NoopLauncher;

#[async_trait]
impl SessionLauncher for NoopLauncher {
    async fn open(&self) -> Result<Box<dyn AutomationSession>> {
        Err(anyhow::anyhow!("Browser not available — local-only mode"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_sessions(&self) -> usize {
        0
    }
}
