//! `clean` subcommand: write the cleaned tables back to disk

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Table};
use console::style;
use polars::prelude::*;

use crate::pipeline::{clean_catalog, CleanOptions, CleaningLog, DataCatalog, DatasetKind};
use crate::report::{save_table, TableFormat};
use crate::utils::{create_spinner, finish_with_success, print_warning};

/// Write a frame as Parquet with statistics and fixed row groups
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .with_statistics(StatisticsOptions::full())
        .with_row_group_size(Some(100_000))
        .finish(df)
        .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
    Ok(())
}

/// Path of a cleaned table; file stems match the loader's so the output
/// directory can be analysed directly
pub fn cleaned_table_path(output_dir: &Path, kind: DatasetKind, format: TableFormat) -> PathBuf {
    output_dir.join(format!("{}.{}", kind.file_stem(), format.extension()))
}

/// Load, clean and write every table; returns the written paths
pub fn run_clean(
    data_dir: &Path,
    output_dir: &Path,
    format: TableFormat,
    options: CleanOptions,
    infer_schema_length: usize,
) -> Result<Vec<PathBuf>> {
    println!(
        "\n {} Cleaning Olist tables",
        style("◆").cyan().bold()
    );
    println!("   Input:  {}", style(data_dir.display()).dim());
    println!("   Output: {}", style(output_dir.display()).dim());
    println!();

    let spinner = create_spinner("Loading datasets...");
    let catalog = DataCatalog::load(data_dir, infer_schema_length);
    finish_with_success(
        &spinner,
        &format!("{} datasets loaded", catalog.loaded_count()),
    );
    for (kind, err) in catalog.errors() {
        print_warning(&format!("{}: {}", kind, err));
    }
    if catalog.loaded_count() == 0 {
        anyhow::bail!("No datasets could be loaded from {}", data_dir.display());
    }

    let spinner = create_spinner("Cleaning...");
    let cleaned = clean_catalog(&catalog, options);
    finish_with_success(
        &spinner,
        &format!("{} cleaning actions", cleaned.log.len()),
    );

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let spinner = create_spinner("Writing cleaned tables...");
    let mut written = Vec::new();
    for (kind, frame) in cleaned.to_frames() {
        let mut df = match frame {
            Ok(df) => df,
            Err(err) => {
                tracing::warn!(dataset = kind.name(), %err, "table not written");
                continue;
            }
        };
        let path = cleaned_table_path(output_dir, kind, format);
        match format {
            TableFormat::Parquet => write_parquet(&mut df, &path)?,
            TableFormat::Csv => save_table(&mut df, &path)?,
        }
        written.push(path);
    }
    finish_with_success(&spinner, &format!("{} tables written", written.len()));

    print_cleaning_log(&cleaned.log);

    let total_size: u64 = written
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();
    println!();
    println!(
        "   {} tables, {:.2} MB",
        style(written.len()).yellow(),
        total_size as f64 / (1024.0 * 1024.0)
    );
    println!();
    println!(" {} Cleaning complete!", style("✓").green().bold());

    Ok(written)
}

fn print_cleaning_log(log: &CleaningLog) {
    if log.is_empty() {
        return;
    }
    println!();
    println!("   {} Cleaning log:", style("✧").cyan());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Dataset").add_attribute(Attribute::Bold),
        Cell::new("Action").add_attribute(Attribute::Bold),
        Cell::new("Details").add_attribute(Attribute::Bold),
    ]);
    for action in log.actions() {
        table.add_row(vec![
            Cell::new(&action.dataset),
            Cell::new(&action.action),
            Cell::new(&action.details),
        ]);
    }
    for line in table.to_string().lines() {
        println!("   {}", line);
    }
}
