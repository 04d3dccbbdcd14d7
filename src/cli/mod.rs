//! CLI module - argument parsing, prompts and the subcommands

mod args;
pub mod clean;
pub mod generate;
mod prompts;
pub mod validate;

pub use args::{sibling_dir, Cli, Commands};
pub use clean::run_clean;
pub use generate::generate_dataset;
pub use prompts::*;
pub use validate::run_validate;
