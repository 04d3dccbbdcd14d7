//! End-to-end tests for the JSON report, derived tables and the zip bundle

use std::path::Path;

use ecomlens::pipeline::{
    clean_catalog, run_analysis, AnalysisOptions, AnalysisResults, CleanedData, DataCatalog,
    DatasetKind,
};
use ecomlens::report::{
    export_outputs, AnalysisReport, Page, ReportMetadata, TableFormat, BUNDLE_FILE, REPORT_FILE,
};
use polars::prelude::*;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

fn options() -> AnalysisOptions {
    AnalysisOptions {
        forest_trees: 10,
        ..AnalysisOptions::default()
    }
}

fn analyse(dir: &Path) -> (DataCatalog, CleanedData, AnalysisResults) {
    let catalog = DataCatalog::load(dir, 1000);
    let cleaned = clean_catalog(&catalog, Default::default());
    let results = run_analysis(&cleaned, &options());
    (catalog, cleaned, results)
}

fn export(
    data_dir: &Path,
    out_dir: &Path,
    format: TableFormat,
    bundle: bool,
) -> Vec<std::path::PathBuf> {
    let (catalog, cleaned, results) = analyse(data_dir);
    let metadata = ReportMetadata::new(data_dir, &Page::ALL, format, &options());
    let report = AnalysisReport::new(metadata, &catalog, &cleaned.log, &results);
    export_outputs(&report, &results, out_dir, format, bundle).unwrap()
}

#[test]
fn test_full_export_writes_report_and_tables() {
    let data = common::generated_dataset_dir(500, 5);
    let out = TempDir::new().unwrap();
    let files = export(data.path(), out.path(), TableFormat::Csv, false);

    assert_eq!(files.len(), 6, "Report plus five tables: {:?}", files);
    for name in [
        REPORT_FILE,
        "customer_metrics.csv",
        "segment_summary.csv",
        "monthly_totals.csv",
        "state_opportunities.csv",
        "payment_methods.csv",
    ] {
        assert!(out.path().join(name).exists(), "{} not written", name);
    }

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path().join(REPORT_FILE)).unwrap())
            .unwrap();
    for section in ["overview", "customers", "seasonal", "forecast", "market", "payments"] {
        assert_eq!(
            json[section]["status"], "available",
            "{} should be available: {}",
            section, json[section]
        );
    }
    assert_eq!(json["metadata"]["table_format"], "csv");
    assert_eq!(json["datasets"].as_array().unwrap().len(), 9);
    assert_eq!(json["forecast"]["result"]["forecast"].as_array().unwrap().len(), 3);

    let monthly = CsvReadOptions::default()
        .try_into_reader_with_file_path(Some(out.path().join("monthly_totals.csv")))
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(monthly.height(), 12);
}

#[test]
fn test_customer_table_round_trips_as_parquet() {
    let data = common::generated_dataset_dir(300, 8);
    let out = TempDir::new().unwrap();
    export(data.path(), out.path(), TableFormat::Parquet, false);

    let file = std::fs::File::open(out.path().join("customer_metrics.parquet")).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert!(df.height() > 0);
    assert!(df.column("segment").is_ok());
    assert!(df.column("clv").is_ok());
}

#[test]
fn test_bundle_leaves_only_the_zip() {
    let data = common::generated_dataset_dir(300, 9);
    let out = TempDir::new().unwrap();
    let files = export(data.path(), out.path(), TableFormat::Csv, true);

    assert_eq!(files, vec![out.path().join(BUNDLE_FILE)]);
    let entries: Vec<_> = std::fs::read_dir(out.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries.len(), 1, "Loose files remain: {:?}", entries);

    let archive = ::zip::ZipArchive::new(std::fs::File::open(&files[0]).unwrap()).unwrap();
    assert_eq!(archive.len(), 6);
}

#[test]
fn test_missing_table_marks_section_unavailable() {
    let data = common::generated_dataset_dir(300, 10);
    std::fs::remove_file(data.path().join(DatasetKind::OrderPayments.file_name())).unwrap();
    let out = TempDir::new().unwrap();
    let files = export(data.path(), out.path(), TableFormat::Csv, false);

    assert!(!out.path().join("payment_methods.csv").exists());
    assert_eq!(files.len(), 5);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path().join(REPORT_FILE)).unwrap())
            .unwrap();
    assert_eq!(json["payments"]["status"], "unavailable");
    assert!(json["payments"]["error"]
        .as_str()
        .unwrap()
        .contains("olist_order_payments_dataset.csv"));
    assert_eq!(json["customers"]["status"], "available");
    assert_eq!(json["load_failures"].as_array().unwrap().len(), 1);
}
