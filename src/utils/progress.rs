//! Spinners and progress bars for the pipeline steps

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const SPINNER_TEMPLATE: &str = "    {spinner:.cyan} {msg}";
const BAR_TEMPLATE: &str = "    {msg:<24} [{bar:40.cyan/blue}] {pos}/{len} {elapsed_precise}";

fn styled(pb: ProgressBar, style: ProgressStyle, message: &str) -> ProgressBar {
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Spinner for steps without a known length (cleaning, model fitting, export)
pub fn create_spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let pb = styled(ProgressBar::new_spinner(), style, message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Bar advanced once per dataset file
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░");
    styled(ProgressBar::new(len), style, message)
}

pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✅ {}", message));
}

/// Used when some datasets or analyses were unavailable
pub fn finish_with_warning(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("⚠️  {}", message));
}
