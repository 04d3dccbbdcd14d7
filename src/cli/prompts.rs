//! Interactive prompts using dialoguer

use std::path::Path;

use anyhow::Result;
use dialoguer::Confirm;

/// Prompt user to confirm proceeding with an action
pub fn confirm_step(message: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(message)
        .default(true)
        .interact()?;
    Ok(confirmed)
}

/// Whether writing into `dir` may replace earlier output
pub fn needs_overwrite_confirmation(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Ask before writing into a non-empty output directory. Always true when
/// the directory is empty or `no_confirm` is set.
pub fn confirm_overwrite(dir: &Path, no_confirm: bool) -> Result<bool> {
    if no_confirm || !needs_overwrite_confirmation(dir) {
        return Ok(true);
    }
    confirm_step(&format!(
        "Output directory {} is not empty. Overwrite existing files?",
        dir.display()
    ))
}
