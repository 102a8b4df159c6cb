//! Chromium-based automation using chromiumoxide.

use super::script;
use super::{AutomationSession, GlyphQuery, NavigationResult, SessionLauncher, SubmitTier};
use crate::config::BrowserSettings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Interval between readiness probes while waiting on the page.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause between scrolling the submit control into view and clicking it.
const SCROLL_SETTLE: Duration = Duration::from_millis(200);

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Configured path (PILLAR_CHROMIUM_PATH)
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. ~/.pillar/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".pillar/chromium/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".pillar/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".pillar/chromium/chrome-linux64/chrome"),
                home.join(".pillar/chromium/chrome"),
            ]
        };
        if let Some(c) = candidates.into_iter().find(|c| c.exists()) {
            return Some(c);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-backed session launcher.
pub struct ChromiumLauncher {
    browser: Browser,
    handler: JoinHandle<()>,
    settings: BrowserSettings,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumLauncher {
    /// Launch a Chromium instance, headless unless the settings ask otherwise.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let chrome_path = find_chromium(settings.chromium_path.as_ref())
            .context("Chromium not found. Set PILLAR_CHROMIUM_PATH or install Chrome.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(settings.window_width, settings.window_height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--blink-settings=imagesEnabled=false")
            .arg(format!("--lang={}", settings.language));
        builder = if settings.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(headless = settings.headless, "Chromium launched");

        Ok(Self {
            browser,
            handler,
            settings: settings.clone(),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    async fn prepare_page(&self, page: &Page) -> Result<()> {
        page.execute(ClearBrowserCookiesParams::default())
            .await
            .context("failed to clear cookies")?;

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(self.settings.user_agent.clone())
            .accept_language(self.settings.language.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("invalid user agent override: {e}"))?;
        page.execute(ua).await.context("failed to set user agent")?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            script::HIDE_WEBDRIVER,
        ))
        .await
        .context("failed to install init script")?;
        Ok(())
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn AutomationSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        if let Err(e) = self.prepare_page(&page).await {
            let _ = page.close().await;
            return Err(e);
        }

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumSession {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.handler.abort();
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium tab driving the calculation form.
pub struct ChromiumSession {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumSession {
    async fn eval<T: serde::de::DeserializeOwned>(&self, js: &str) -> Result<T> {
        self.page
            .evaluate(js)
            .await
            .context("JS execution failed")?
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    /// Re-evaluate a boolean probe until it holds or `timeout_ms` passes.
    async fn poll_until(&self, probe: &str, timeout_ms: u64) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.eval::<bool>(probe).await.unwrap_or(false) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl AutomationSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }

        let remaining = timeout_ms.saturating_sub(start.elapsed().as_millis() as u64);
        if !self.poll_until(script::DOCUMENT_READY, remaining).await? {
            bail!("document not ready after {timeout_ms}ms");
        }

        let final_url = self
            .page
            .url()
            .await
            .unwrap_or_default()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> Result<bool> {
        self.poll_until(&script::selector_present(selector), timeout_ms)
            .await
    }

    async fn set_field(&mut self, id: &str, value: &str) -> Result<bool> {
        self.eval(&script::set_field(id, value)).await
    }

    async fn check_radio(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.eval::<bool>(&script::check_radio(name, value)).await? {
            bail!("radio {name}={value} not found");
        }
        Ok(())
    }

    async fn submit(&mut self, label: &str, tier: SubmitTier, timeout_ms: u64) -> Result<()> {
        match tier {
            SubmitTier::Interactive => {
                if !self
                    .poll_until(&script::submit_interactable(label), timeout_ms)
                    .await?
                {
                    bail!("submit control not interactable within {timeout_ms}ms");
                }
                let button = self
                    .page
                    .find_xpath(script::submit_xpath(label))
                    .await
                    .context("submit control vanished")?;
                button
                    .scroll_into_view()
                    .await
                    .context("failed to scroll submit control into view")?;
                tokio::time::sleep(SCROLL_SETTLE).await;
                button.click().await.context("click failed")?;
            }
            SubmitTier::Forced => {
                if !self.eval::<bool>(&script::force_click(label)).await? {
                    bail!("submit control {label:?} not found");
                }
            }
        }
        Ok(())
    }

    async fn collect_glyphs(&mut self, query: &GlyphQuery) -> Result<Vec<String>> {
        self.eval(&script::collect_glyphs(query)).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_form_roundtrip() {
        let launcher = ChromiumLauncher::launch(&BrowserSettings::default())
            .await
            .expect("failed to launch");
        let mut session = launcher.open().await.expect("failed to open session");

        session
            .navigate(
                "data:text/html,<input id='_Year'><div class='w10'>四柱<span class='w-blue'>甲子</span></div>",
                10_000,
            )
            .await
            .expect("navigation failed");

        assert!(session.set_field("_Year", "1987").await.unwrap());
        assert!(!session.set_field("_Hour", "10").await.unwrap());
        assert!(session.wait_for_selector("span.w-blue", 1_000).await.unwrap());

        let glyphs = session
            .collect_glyphs(&GlyphQuery::Global {
                leaf: "span.w-blue".into(),
            })
            .await
            .unwrap();
        assert_eq!(glyphs, vec!["甲子".to_string()]);

        session.close().await.expect("close failed");
        assert_eq!(launcher.active_sessions(), 0);
        launcher.shutdown().await.expect("shutdown failed");
    }
}
