//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::FrequencyAxis;
use crate::report::{parse_pages, Page, TableFormat};

/// ecomlens - Business intelligence dashboard for the Olist e-commerce dataset
#[derive(Parser, Debug)]
#[command(name = "ecomlens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding the Olist CSV (or Parquet) files
    #[arg(short, long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for the JSON report and derived tables.
    /// Defaults to a '_report' sibling of the data directory (e.g., data → data_report).
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Dashboard pages to render (comma-separated).
    /// Options: overview, customers, seasonal, market, payments, all
    #[arg(short, long, default_value = "all", value_parser = validate_pages)]
    pub pages: String,

    /// Signal for the RFM frequency score.
    /// Options: "auto" (order count unless every customer has one order), "orders", "delivery-speed"
    #[arg(long, default_value = "auto")]
    pub frequency_axis: FrequencyAxis,

    /// Fill missing delivery timestamps of delivered orders from the estimated date
    #[arg(long, default_value = "false")]
    pub impute_delivery_dates: bool,

    /// File format of the exported tables: "csv" or "parquet"
    #[arg(long, default_value = "parquet")]
    pub table_format: TableFormat,

    /// Pack the report and tables into a single zip archive
    #[arg(long, default_value = "false")]
    pub bundle: bool,

    /// Number of trees in the forecasting and high-value forests (1-1000)
    #[arg(long, default_value = "100", value_parser = validate_trees)]
    pub forecast_trees: usize,

    /// Random seed for bootstrap sampling and train/test splits
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Skip interactive confirmation prompts
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,

    /// Render the pages without writing any files
    #[arg(long, default_value = "false")]
    pub no_export: bool,

    /// Print diagnostic logs (cleaning actions, skipped rows) to stderr
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load every dataset and report data quality issues
    Validate {
        /// Directory holding the Olist CSV (or Parquet) files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Number of rows to use for schema inference (0 = full scan)
        #[arg(long, default_value = "10000")]
        infer_schema_length: usize,
    },

    /// Clean every dataset and write the cleaned tables
    Clean {
        /// Directory holding the Olist CSV (or Parquet) files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Output directory (defaults to a '_clean' sibling of the data directory).
        /// Cleaned Parquet tables keep the original file stems, so the output can
        /// be used as a data directory.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// File format of the cleaned tables: "csv" or "parquet"
        #[arg(long, default_value = "parquet")]
        format: TableFormat,

        /// Fill missing delivery timestamps of delivered orders from the estimated date
        #[arg(long, default_value = "false")]
        impute_delivery_dates: bool,

        /// Number of rows to use for schema inference (0 = full scan)
        #[arg(long, default_value = "10000")]
        infer_schema_length: usize,
    },

    /// Write a synthetic Olist-shaped dataset for demos and tests
    Generate {
        /// Directory to write the CSV files into
        output_dir: PathBuf,

        /// Number of customers to generate (10-1000000)
        #[arg(long, default_value = "2000", value_parser = validate_customers)]
        customers: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

impl Cli {
    /// Pages selected with `--pages`
    pub fn pages(&self) -> Vec<Page> {
        // Already checked by the value parser
        parse_pages(&self.pages).unwrap_or_else(|_| Page::ALL.to_vec())
    }

    /// Get the output directory, deriving it from the data directory if not provided
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| sibling_dir(&self.data_dir, "report"))
    }
}

/// `<parent>/<name>_<suffix>` for a directory path
pub fn sibling_dir(dir: &std::path::Path, suffix: &str) -> PathBuf {
    let parent = dir.parent().unwrap_or_else(|| std::path::Path::new("."));
    let name = dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    parent.join(format!("{}_{}", name, suffix))
}

/// Validator for the page list
fn validate_pages(s: &str) -> Result<String, String> {
    parse_pages(s)?;
    Ok(s.to_string())
}

/// Validator for forecast_trees parameter
fn validate_trees(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(1..=1000).contains(&value) {
        Err(format!(
            "forecast_trees must be between 1 and 1000, got {}",
            value
        ))
    } else {
        Ok(value)
    }
}

/// Validator for the generated customer count
fn validate_customers(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(10..=1_000_000).contains(&value) {
        Err(format!(
            "customers must be between 10 and 1000000, got {}",
            value
        ))
    } else {
        Ok(value)
    }
}
