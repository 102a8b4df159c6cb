//! Runtime configuration: defaults overridden by `PILLAR_*` environment variables.

use crate::calendar::DEFAULT_UTC_OFFSET_MINUTES;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

/// Entry page of the external calculation service.
pub const DEFAULT_BASE_URL: &str = "https://pay.ncc.com.tw/s.php?bg=nccsoft&ID=ncc&fw=www";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How Chromium is launched.
#[derive(Debug, Clone, Serialize)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    pub user_agent: String,
    pub language: String,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            language: "zh-TW".to_string(),
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Bounded waits of the remote acquisition protocol, in milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub submit_ms: u64,
    pub marker_ms: u64,
    /// Pause after writing the year, which makes the form rebuild its day list.
    pub field_settle_ms: u64,
    /// Pause between the last field write and submission.
    pub submit_settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 40_000,
            submit_ms: 40_000,
            marker_ms: 40_000,
            field_settle_ms: 100,
            submit_settle_ms: 200,
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfig {
    pub base_url: String,
    /// Offset of the civil zone used for "today" and for subject moments.
    pub utc_offset_minutes: i32,
    pub browser: BrowserSettings,
    pub timeouts: Timeouts,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            browser: BrowserSettings::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps variable names to values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("PILLAR_BASE_URL") {
            config.base_url = url;
        }
        if let Some(v) = lookup("PILLAR_HEADLESS") {
            config.browser.headless = parse_bool(&v)
                .with_context(|| format!("PILLAR_HEADLESS must be a boolean, got {v:?}"))?;
        }
        if let Some(p) = lookup("PILLAR_CHROMIUM_PATH") {
            config.browser.chromium_path = Some(PathBuf::from(p));
        }
        if let Some(v) = lookup("PILLAR_UTC_OFFSET_MINUTES") {
            config.utc_offset_minutes = v
                .trim()
                .parse()
                .with_context(|| format!("PILLAR_UTC_OFFSET_MINUTES is not an integer: {v:?}"))?;
        }
        if let Some(v) = lookup("PILLAR_MARKER_TIMEOUT_MS") {
            config.timeouts.marker_ms = v
                .trim()
                .parse()
                .with_context(|| format!("PILLAR_MARKER_TIMEOUT_MS is not an integer: {v:?}"))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .with_context(|| format!("invalid base URL {:?}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("base URL must be http(s), got {}", url.scheme());
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            anyhow::bail!("utc offset {} minutes outside ±14h", self.utc_offset_minutes);
        }
        Ok(())
    }
}

/// Default `tracing` filter directive for the library's targets.
pub fn log_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{}={level}", env!("CARGO_CRATE_NAME"))
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_directive_covers_library_targets() {
        assert_eq!(log_directive(false), "pillar_runtime=info");
        assert_eq!(log_directive(true), "pillar_runtime=debug");
        let target = module_path!();
        assert!(target.starts_with("pillar_runtime::"), "{target}");
    }

    fn from(pairs: &[(&str, &str)]) -> Result<RuntimeConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = from(&[]).unwrap();
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert!(c.browser.headless);
        assert_eq!(c.utc_offset_minutes, 480);
        assert_eq!(c.timeouts.submit_settle_ms, 200);
    }

    #[test]
    fn test_overrides() {
        let c = from(&[
            ("PILLAR_BASE_URL", "http://localhost:8080/form"),
            ("PILLAR_HEADLESS", "off"),
            ("PILLAR_UTC_OFFSET_MINUTES", "-300"),
            ("PILLAR_MARKER_TIMEOUT_MS", "5000"),
        ])
        .unwrap();
        assert_eq!(c.base_url, "http://localhost:8080/form");
        assert!(!c.browser.headless);
        assert_eq!(c.utc_offset_minutes, -300);
        assert_eq!(c.timeouts.marker_ms, 5000);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(from(&[("PILLAR_HEADLESS", "maybe")]).is_err());
        assert!(from(&[("PILLAR_BASE_URL", "not a url")]).is_err());
        assert!(from(&[("PILLAR_BASE_URL", "ftp://x.test/")]).is_err());
        assert!(from(&[("PILLAR_UTC_OFFSET_MINUTES", "9000")]).is_err());
    }
}
