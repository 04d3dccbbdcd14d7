//! `validate` subcommand: dataset summary and data quality checks

use std::path::Path;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};

use crate::pipeline::{assess_quality, dataset_summary, DataCatalog, QualityReport};
use crate::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_info, print_section,
    print_success, print_warning,
};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn print_table(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn count_cell(count: usize) -> Cell {
    Cell::new(count)
        .set_alignment(CellAlignment::Right)
        .fg(if count > 0 { Color::Yellow } else { Color::Green })
}

/// Load every dataset, print its summary and the quality checks.
/// Returns the quality report so callers can decide on an exit status.
pub fn run_validate(data_dir: &Path, infer_schema_length: usize) -> Result<QualityReport> {
    let spinner = create_spinner("Loading datasets...");
    let catalog = DataCatalog::load(data_dir, infer_schema_length);
    let errors = catalog.errors();
    if errors.is_empty() {
        finish_with_success(&spinner, &format!("{} datasets loaded", catalog.loaded_count()));
    } else {
        finish_with_warning(
            &spinner,
            &format!(
                "{} datasets loaded, {} failed",
                catalog.loaded_count(),
                errors.len()
            ),
        );
    }
    for (_, err) in &errors {
        print_warning(&err.to_string());
    }

    print_section("Datasets");
    let mut table = new_table(&["Dataset", "Rows", "Columns", "Memory (MB)", "Missing cells", "Missing %"]);
    for s in dataset_summary(&catalog) {
        table.add_row(vec![
            Cell::new(&s.dataset),
            Cell::new(s.rows).set_alignment(CellAlignment::Right),
            Cell::new(s.columns).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", s.memory_mb)).set_alignment(CellAlignment::Right),
            Cell::new(s.missing_cells).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", s.missing_pct)).set_alignment(CellAlignment::Right),
        ]);
    }
    print_table(&table);

    let report = assess_quality(&catalog);

    if !report.missing.is_empty() {
        print_section("Missing Values");
        let mut table = new_table(&["Dataset", "Column", "Missing %"]);
        for m in &report.missing {
            table.add_row(vec![
                Cell::new(&m.dataset),
                Cell::new(&m.column),
                Cell::new(format!("{:.2}%", m.missing_pct)).set_alignment(CellAlignment::Right),
            ]);
        }
        print_table(&table);
    }

    print_section("Referential Integrity");
    let mut table = new_table(&["Relationship", "Child rows", "Orphaned"]);
    for c in &report.integrity {
        table.add_row(vec![
            Cell::new(&c.relationship),
            Cell::new(c.child_rows).set_alignment(CellAlignment::Right),
            count_cell(c.orphaned),
        ]);
    }
    print_table(&table);

    print_section("Business Rules");
    let mut table = new_table(&["Rule", "Dataset", "Checked", "Violations"]);
    for r in &report.rules {
        table.add_row(vec![
            Cell::new(&r.rule),
            Cell::new(&r.dataset),
            Cell::new(r.checked).set_alignment(CellAlignment::Right),
            count_cell(r.violations),
        ]);
    }
    print_table(&table);

    print_section("Value Ranges");
    let mut table = new_table(&["Dataset", "Column", "Allowed", "Checked", "Out of range"]);
    for r in &report.ranges {
        table.add_row(vec![
            Cell::new(&r.dataset),
            Cell::new(&r.column),
            Cell::new(format!("{} – {}", r.min_allowed, r.max_allowed)),
            Cell::new(r.checked).set_alignment(CellAlignment::Right),
            count_cell(r.out_of_range),
        ]);
    }
    print_table(&table);

    println!();
    for skipped in &report.skipped {
        print_info(&format!("Skipped: {}", skipped));
    }
    match report.issue_count() {
        0 => print_success("No data quality issues found"),
        n => print_warning(&format!("{} checks reported issues", n)),
    }

    Ok(report)
}
