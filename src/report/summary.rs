//! Run summary table printed at the end of an analysis

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

/// Outcome of one run: datasets, cleaning, pages and timings
#[derive(Debug, Default)]
pub struct RunSummary {
    pub datasets_loaded: usize,
    pub datasets_failed: Vec<String>,
    pub cleaning_actions: usize,
    pub pages_rendered: Vec<String>,
    pub pages_failed: Vec<String>,
    pub exported_files: Vec<String>,
    pub step_times: Vec<(String, Duration)>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_time(&mut self, step: &str, elapsed: Duration) {
        self.step_times.push((step.to_string(), elapsed));
    }

    pub fn add_page(&mut self, page: &str, ok: bool) {
        if ok {
            self.pages_rendered.push(page.to_string());
        } else {
            self.pages_failed.push(page.to_string());
        }
    }

    pub fn total_time(&self) -> Duration {
        self.step_times.iter().map(|(_, d)| *d).sum()
    }

    fn count_cell(count: usize, bad: bool) -> Cell {
        Cell::new(count).fg(if bad && count > 0 {
            Color::Red
        } else {
            Color::White
        })
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![
            Cell::new("📁 Datasets Loaded"),
            Cell::new(self.datasets_loaded).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("🚫 Datasets Failed"),
            Self::count_cell(self.datasets_failed.len(), true),
        ]);
        table.add_row(vec![
            Cell::new("🧹 Cleaning Actions"),
            Cell::new(self.cleaning_actions),
        ]);
        table.add_row(vec![
            Cell::new("📑 Pages Rendered"),
            Cell::new(self.pages_rendered.len())
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("⚠️  Pages Unavailable"),
            Self::count_cell(self.pages_failed.len(), true),
        ]);
        table.add_row(vec![
            Cell::new("💾 Files Exported"),
            Cell::new(self.exported_files.len()),
        ]);

        for (step, elapsed) in &self.step_times {
            table.add_row(vec![
                Cell::new(format!("⏱️  {}", step)),
                Cell::new(format!("{:.2}s", elapsed.as_secs_f64())).fg(Color::Cyan),
            ]);
        }
        table.add_row(vec![
            Cell::new("⏱️  Total"),
            Cell::new(format!("{:.2}s", self.total_time().as_secs_f64()))
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
        ]);

        // Indent the table
        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        if !self.datasets_failed.is_empty() || !self.pages_failed.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("UNAVAILABLE").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());

            for (title, names) in [
                ("Datasets", &self.datasets_failed),
                ("Pages", &self.pages_failed),
            ] {
                if names.is_empty() {
                    continue;
                }
                println!();
                println!(
                    "      {} {}:",
                    style(title).yellow(),
                    style(format!("({})", names.len())).dim()
                );
                for name in names {
                    println!("        {} {}", style("•").dim(), name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_time_sums_steps() {
        let mut summary = RunSummary::new();
        summary.record_time("Load", Duration::from_millis(250));
        summary.record_time("Clean", Duration::from_millis(750));
        assert_eq!(summary.total_time(), Duration::from_secs(1));
    }

    #[test]
    fn test_add_page_splits_outcomes() {
        let mut summary = RunSummary::new();
        summary.add_page("overview", true);
        summary.add_page("market", false);
        assert_eq!(summary.pages_rendered, vec!["overview"]);
        assert_eq!(summary.pages_failed, vec!["market"]);
    }
}
