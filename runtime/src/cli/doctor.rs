//! Environment readiness check.

use crate::automation::chromium::find_chromium;
use crate::config::RuntimeConfig;
use anyhow::Result;

/// Check configuration and Chromium availability.
pub async fn run() -> Result<()> {
    println!("Pillar Doctor");
    println!("=============");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let config = match RuntimeConfig::from_env() {
        Ok(c) => {
            println!("[OK] Configuration valid");
            println!("     base URL:   {}", c.base_url);
            println!("     headless:   {}", c.browser.headless);
            println!("     UTC offset: {} min", c.utc_offset_minutes);
            Some(c)
        }
        Err(e) => {
            println!("[!!] Configuration invalid: {e:#}");
            None
        }
    };

    let chromium = find_chromium(config.as_ref().and_then(|c| c.browser.chromium_path.as_ref()));
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Remote strategy unavailable; set PILLAR_CHROMIUM_PATH."),
    }

    println!();
    match (config.is_some(), chromium.is_some()) {
        (true, true) => println!("Status: READY"),
        (true, false) => println!("Status: LOCAL ONLY"),
        _ => println!("Status: NOT READY"),
    }
    Ok(())
}
