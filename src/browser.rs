use std::process::Command;

use anyhow::Context;

/// Open URL in browser using platform-specific command
pub fn open_browser(url: &str) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    let status = Command::new("open").arg(url).status();

    #[cfg(target_os = "windows")]
    let status = Command::new("cmd").args(["/c", "start", "", url]).status();

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let status = Command::new("xdg-open").arg(url).status();

    let status = status.context("Failed to execute browser command")?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Browser command exited with {}", status))
    }
}
