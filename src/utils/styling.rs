//! Terminal styling utilities for the dashboard output

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static PAGES: Emoji<'_, '_> = Emoji("📑 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "");

/// Print the application banner with ASCII art
pub fn print_banner(version: &str) {
    let banner = r#"
    ███████╗ ██████╗ ██████╗ ███╗   ███╗██╗     ███████╗███╗   ██╗███████╗
    ██╔════╝██╔════╝██╔═══██╗████╗ ████║██║     ██╔════╝████╗  ██║██╔════╝
    █████╗  ██║     ██║   ██║██╔████╔██║██║     █████╗  ██╔██╗ ██║███████╗
    ██╔══╝  ██║     ██║   ██║██║╚██╔╝██║██║     ██╔══╝  ██║╚██╗██║╚════██║
    ███████╗╚██████╗╚██████╔╝██║ ╚═╝ ██║███████╗███████╗██║ ╚████║███████║
    ╚══════╝ ╚═════╝ ╚═════╝ ╚═╝     ╚═╝╚══════╝╚══════╝╚═╝  ╚═══╝╚══════╝
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {} {}",
        style("R$").magenta().bold(),
        style("Brazilian e-commerce business intelligence").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print configuration card
pub fn print_config(data_dir: &Path, output: Option<&Path>, pages: &str, frequency_axis: &str) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);
    let output = output.map_or_else(|| "(export disabled)".to_string(), |p| truncate_path(p, 38));

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!("    │  {} Data:   {:<39}│", FOLDER, truncate_path(data_dir, 38));
    println!("    │  {} Output: {:<39}│", SAVE, truncate_string(&output, 38));
    println!("    ├{}┤", line);
    println!(
        "    │  {} Pages:           {:<30}│",
        PAGES,
        style(truncate_string(pages, 30)).yellow()
    );
    println!(
        "    │  {} Frequency axis:  {:<30}│",
        CHART,
        style(frequency_axis).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a page header, the dashboard counterpart of a step header
pub fn print_page_header(title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style("PAGE").magenta().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("═".repeat(50)).dim());
}

/// Print a section title inside a page
pub fn print_section(title: &str) {
    println!();
    println!("    {} {}", style("✧").cyan(), style(title).bold());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

/// Print how long a step took
pub fn print_step_time(elapsed: Duration) {
    println!(
        "      {} {}",
        CLOCK,
        style(format!("{:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("ecomlens analysis complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(info) = detail {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        );
    } else {
        println!("      Found {} {}", style(count).yellow().bold(), description);
    }
}

// Helper functions

pub fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

/// Keep the tail of `s` within `max_len` characters
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - max_len + 3).collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string_keeps_tail() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghijkl", 8), "...hijkl");
    }

    #[test]
    fn test_truncate_string_multibyte() {
        let s = "são_paulo_região";
        let t = truncate_string(s, 8);
        assert_eq!(t.chars().count(), 8);
        assert!(t.starts_with("..."));
    }
}
