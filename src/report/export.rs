//! Analysis report export
//!
//! Writes the JSON report with every page's result (or the reason it is
//! missing), the derived tables as CSV or Parquet, and optionally packs
//! everything into a zip bundle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;

use crate::pipeline::customers::CustomerReport;
use crate::pipeline::error::DataResult;
use crate::pipeline::features::CustomerTable;
use crate::pipeline::forecast::ForecastReport;
use crate::pipeline::market::MarketReport;
use crate::pipeline::overview::OverviewReport;
use crate::pipeline::payments::PaymentReport;
use crate::pipeline::seasonal::SeasonalReport;
use crate::pipeline::{
    assess_quality, AnalysisOptions, AnalysisResults, CleaningLog, DataCatalog, DatasetSummary,
    QualityReport,
};
use crate::report::pages::Page;

pub const REPORT_FILE: &str = "analysis_report.json";
pub const BUNDLE_FILE: &str = "ecomlens_report.zip";

/// File format of the derived tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    #[default]
    Parquet,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" | "pq" => Ok(TableFormat::Parquet),
            _ => Err(format!(
                "Invalid table format: '{}'. Use 'csv' or 'parquet'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub version: String,
    pub data_dir: String,
    pub pages: Vec<Page>,
    pub table_format: TableFormat,
    pub options: AnalysisOptions,
}

impl ReportMetadata {
    pub fn new(
        data_dir: &Path,
        pages: &[Page],
        table_format: TableFormat,
        options: &AnalysisOptions,
    ) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: data_dir.display().to_string(),
            pages: pages.to_vec(),
            table_format,
            options: options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub dataset: String,
    pub error: String,
}

/// One analysis in the report: its result, or why it could not run
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Section<'a, T> {
    Available { result: &'a T },
    Unavailable { error: String },
}

impl<'a, T> From<&'a DataResult<T>> for Section<'a, T> {
    fn from(result: &'a DataResult<T>) -> Self {
        match result {
            Ok(result) => Section::Available { result },
            Err(err) => Section::Unavailable {
                error: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    pub metadata: ReportMetadata,
    pub datasets: Vec<DatasetSummary>,
    pub load_failures: Vec<LoadFailure>,
    pub quality: QualityReport,
    pub cleaning_log: &'a CleaningLog,
    pub overview: Section<'a, OverviewReport>,
    pub customers: Section<'a, CustomerReport>,
    pub seasonal: Section<'a, SeasonalReport>,
    pub forecast: Section<'a, ForecastReport>,
    pub market: Section<'a, MarketReport>,
    pub payments: Section<'a, PaymentReport>,
}

impl<'a> AnalysisReport<'a> {
    pub fn new(
        metadata: ReportMetadata,
        catalog: &DataCatalog,
        cleaning_log: &'a CleaningLog,
        results: &'a AnalysisResults,
    ) -> Self {
        Self {
            metadata,
            datasets: crate::pipeline::dataset_summary(catalog),
            load_failures: catalog
                .errors()
                .into_iter()
                .map(|(kind, err)| LoadFailure {
                    dataset: kind.name().to_string(),
                    error: err.to_string(),
                })
                .collect(),
            quality: assess_quality(catalog),
            cleaning_log,
            overview: (&results.overview).into(),
            customers: (&results.customers).into(),
            seasonal: (&results.seasonal).into(),
            forecast: (&results.forecast).into(),
            market: (&results.market).into(),
            payments: (&results.payments).into(),
        }
    }
}

/// Export the analysis report to a JSON file
pub fn export_analysis_report(report: &AnalysisReport<'_>, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize analysis report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write analysis report to {}", output_path.display()))?;

    Ok(())
}

// Derived tables

pub fn customer_metrics_frame(table: &CustomerTable) -> PolarsResult<DataFrame> {
    let c = &table.customers;
    df!(
        "customer_id" => c.iter().map(|m| m.customer_id.as_str()).collect::<Vec<_>>(),
        "customer_unique_id" => c.iter().map(|m| m.unique_id.clone()).collect::<Vec<_>>(),
        "customer_state" => c.iter().map(|m| m.state.clone()).collect::<Vec<_>>(),
        "total_orders" => c.iter().map(|m| m.total_orders as u64).collect::<Vec<_>>(),
        "total_revenue" => c.iter().map(|m| m.total_revenue).collect::<Vec<_>>(),
        "avg_order_value" => c.iter().map(|m| m.avg_order_value).collect::<Vec<_>>(),
        "first_order" => c.iter().map(|m| m.first_order.to_string()).collect::<Vec<_>>(),
        "last_order" => c.iter().map(|m| m.last_order.to_string()).collect::<Vec<_>>(),
        "recency_days" => c.iter().map(|m| m.recency_days).collect::<Vec<_>>(),
        "lifetime_days" => c.iter().map(|m| m.lifetime_days).collect::<Vec<_>>(),
        "clv" => c.iter().map(|m| m.clv).collect::<Vec<_>>(),
        "clv_category" => c.iter().map(|m| m.clv_category.label()).collect::<Vec<_>>(),
        "status" => c.iter().map(|m| format!("{:?}", m.status)).collect::<Vec<_>>(),
        "avg_delivery_days" => c.iter().map(|m| m.avg_delivery_days).collect::<Vec<_>>(),
        "delivery_reliability" => c.iter().map(|m| m.delivery_reliability).collect::<Vec<_>>(),
        "avg_review_score" => c.iter().map(|m| m.avg_review_score).collect::<Vec<_>>(),
        "r_score" => c.iter().map(|m| m.rfm.recency as u32).collect::<Vec<_>>(),
        "f_score" => c.iter().map(|m| m.rfm.frequency as u32).collect::<Vec<_>>(),
        "m_score" => c.iter().map(|m| m.rfm.monetary as u32).collect::<Vec<_>>(),
        "segment" => c.iter().map(|m| m.segment.label()).collect::<Vec<_>>(),
    )
}

pub fn segment_summary_frame(report: &CustomerReport) -> PolarsResult<DataFrame> {
    let s = &report.segments;
    df!(
        "segment" => s.iter().map(|r| r.segment.label()).collect::<Vec<_>>(),
        "customers" => s.iter().map(|r| r.customers as u64).collect::<Vec<_>>(),
        "share_pct" => s.iter().map(|r| r.share_pct).collect::<Vec<_>>(),
        "total_revenue" => s.iter().map(|r| r.total_revenue).collect::<Vec<_>>(),
        "avg_revenue" => s.iter().map(|r| r.avg_revenue).collect::<Vec<_>>(),
        "avg_recency_days" => s.iter().map(|r| r.avg_recency_days).collect::<Vec<_>>(),
        "avg_r_score" => s.iter().map(|r| r.avg_recency_score).collect::<Vec<_>>(),
        "avg_f_score" => s.iter().map(|r| r.avg_frequency_score).collect::<Vec<_>>(),
        "avg_m_score" => s.iter().map(|r| r.avg_monetary_score).collect::<Vec<_>>(),
    )
}

pub fn monthly_totals_frame(report: &SeasonalReport) -> PolarsResult<DataFrame> {
    let b = &report.buckets;
    df!(
        "month" => b.iter().map(|r| r.month).collect::<Vec<_>>(),
        "month_name" => b.iter().map(|r| r.month_name).collect::<Vec<_>>(),
        "revenue" => b.iter().map(|r| r.revenue).collect::<Vec<_>>(),
        "orders" => b.iter().map(|r| r.orders as u64).collect::<Vec<_>>(),
        "avg_order_value" => b.iter().map(|r| r.avg_order_value).collect::<Vec<_>>(),
        "unique_customers" => b.iter().map(|r| r.unique_customers as u64).collect::<Vec<_>>(),
        "years_covered" => b.iter().map(|r| r.years_covered as u64).collect::<Vec<_>>(),
    )
}

pub fn state_opportunities_frame(report: &MarketReport) -> PolarsResult<DataFrame> {
    let o = &report.opportunities;
    df!(
        "rank" => (1..=o.len() as u64).collect::<Vec<_>>(),
        "state" => o.iter().map(|r| r.metrics.state.as_str()).collect::<Vec<_>>(),
        "tier" => o.iter().map(|r| r.tier.map(u32::from)).collect::<Vec<_>>(),
        "customers" => o.iter().map(|r| r.metrics.customers as u64).collect::<Vec<_>>(),
        "sellers" => o.iter().map(|r| r.metrics.sellers as u64).collect::<Vec<_>>(),
        "orders" => o.iter().map(|r| r.metrics.orders as u64).collect::<Vec<_>>(),
        "revenue" => o.iter().map(|r| r.metrics.revenue).collect::<Vec<_>>(),
        "avg_delivery_days" => o.iter().map(|r| r.metrics.avg_delivery_days).collect::<Vec<_>>(),
        "penetration_rate" => o.iter().map(|r| r.penetration_rate).collect::<Vec<_>>(),
        "benchmark_penetration" => o.iter().map(|r| r.benchmark_penetration).collect::<Vec<_>>(),
        "untapped_revenue" => o.iter().map(|r| r.untapped_revenue).collect::<Vec<_>>(),
        "seller_gap" => o.iter().map(|r| r.seller_gap).collect::<Vec<_>>(),
        "market_size_score" => o.iter().map(|r| r.market_size_score).collect::<Vec<_>>(),
        "growth_score" => o.iter().map(|r| r.growth_score).collect::<Vec<_>>(),
        "operational_score" => o.iter().map(|r| r.operational_score).collect::<Vec<_>>(),
        "competitive_score" => o.iter().map(|r| r.competitive_score).collect::<Vec<_>>(),
        "opportunity_score" => o.iter().map(|r| r.opportunity_score).collect::<Vec<_>>(),
        "priority" => o.iter().map(|r| r.priority.label()).collect::<Vec<_>>(),
    )
}

pub fn payment_methods_frame(report: &PaymentReport) -> PolarsResult<DataFrame> {
    let m = &report.methods;
    let stats = |payment_type: &str| {
        report
            .installments
            .iter()
            .find(|s| s.payment_type == payment_type)
    };
    df!(
        "payment_type" => m.iter().map(|r| r.payment_type.as_str()).collect::<Vec<_>>(),
        "payments" => m.iter().map(|r| r.payments as u64).collect::<Vec<_>>(),
        "share_pct" => m.iter().map(|r| r.share_pct).collect::<Vec<_>>(),
        "total_value" => m.iter().map(|r| r.total_value).collect::<Vec<_>>(),
        "avg_installments" => m.iter().map(|r| stats(&r.payment_type).map(|s| s.avg_installments)).collect::<Vec<_>>(),
        "avg_value" => m.iter().map(|r| stats(&r.payment_type).and_then(|s| s.avg_value)).collect::<Vec<_>>(),
        "median_value" => m.iter().map(|r| stats(&r.payment_type).and_then(|s| s.median_value)).collect::<Vec<_>>(),
    )
}

/// Write a DataFrame as CSV or Parquet, chosen by the path's extension
pub fn save_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}

/// Build every derived table whose analysis succeeded
pub fn derived_tables(results: &AnalysisResults) -> Vec<(&'static str, PolarsResult<DataFrame>)> {
    let mut tables = Vec::new();
    if let Ok(table) = &results.customer_table {
        tables.push(("customer_metrics", customer_metrics_frame(table)));
    }
    if let Ok(report) = &results.customers {
        tables.push(("segment_summary", segment_summary_frame(report)));
    }
    if let Ok(report) = &results.seasonal {
        tables.push(("monthly_totals", monthly_totals_frame(report)));
    }
    if let Ok(report) = &results.market {
        tables.push(("state_opportunities", state_opportunities_frame(report)));
    }
    if let Ok(report) = &results.payments {
        tables.push(("payment_methods", payment_methods_frame(report)));
    }
    tables
}

/// Write the derived tables into `output_dir`, returning the written paths
pub fn export_tables(
    results: &AnalysisResults,
    output_dir: &Path,
    format: TableFormat,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (name, frame) in derived_tables(results) {
        let mut df = frame.with_context(|| format!("Failed to build table {}", name))?;
        let path = output_dir.join(format!("{}.{}", name, format.extension()));
        save_table(&mut df, &path)?;
        tracing::info!(table = name, rows = df.height(), path = %path.display(), "table exported");
        written.push(path);
    }
    Ok(written)
}

/// Package report files into a zip archive and remove the originals
pub fn package_report_files(files: &[PathBuf], zip_path: &Path) -> Result<()> {
    use std::io::{Read, Write};
    use ::zip::write::SimpleFileOptions;
    use ::zip::ZipWriter;

    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(::zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?;
        zip.start_file(filename, options)
            .with_context(|| format!("Failed to add {} to zip", filename))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
    }

    zip.finish().context("Failed to finalize zip file")?;

    for path in files {
        std::fs::remove_file(path).ok();
    }

    Ok(())
}

/// Write the report and tables; with `bundle` they end up in one zip file.
/// Returns the paths left on disk.
pub fn export_outputs(
    report: &AnalysisReport<'_>,
    results: &AnalysisResults,
    output_dir: &Path,
    format: TableFormat,
    bundle: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;

    let report_path = output_dir.join(REPORT_FILE);
    export_analysis_report(report, &report_path)?;

    let mut files = vec![report_path];
    files.extend(export_tables(results, output_dir, format)?);

    if bundle {
        let zip_path = output_dir.join(BUNDLE_FILE);
        package_report_files(&files, &zip_path)?;
        return Ok(vec![zip_path]);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::DataError;
    use tempfile::TempDir;

    #[test]
    fn test_table_format_parse() {
        assert_eq!("CSV".parse::<TableFormat>().unwrap(), TableFormat::Csv);
        assert_eq!("parquet".parse::<TableFormat>().unwrap(), TableFormat::Parquet);
        assert!("xlsx".parse::<TableFormat>().is_err());
        assert_eq!(TableFormat::default(), TableFormat::Parquet);
    }

    #[test]
    fn test_section_serializes_status() {
        let ok: DataResult<u32> = Ok(7);
        let err: DataResult<u32> = Err(DataError::InsufficientData("3 months".to_string()));

        let ok_json = serde_json::to_value(Section::from(&ok)).unwrap();
        assert_eq!(ok_json["status"], "available");
        assert_eq!(ok_json["result"], 7);

        let err_json = serde_json::to_value(Section::from(&err)).unwrap();
        assert_eq!(err_json["status"], "unavailable");
        assert!(err_json["error"].as_str().unwrap().contains("3 months"));
    }

    #[test]
    fn test_save_table_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let mut df = df!("a" => [1i64, 2]).unwrap();
        assert!(save_table(&mut df, &dir.path().join("t.xlsx")).is_err());
        assert!(save_table(&mut df, &dir.path().join("t.csv")).is_ok());
    }

    #[test]
    fn test_package_removes_originals() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.csv");
        std::fs::write(&a, "{}").unwrap();
        std::fs::write(&b, "x\n1\n").unwrap();

        let zip_path = dir.path().join(BUNDLE_FILE);
        package_report_files(&[a.clone(), b.clone()], &zip_path).unwrap();

        assert!(zip_path.exists());
        assert!(!a.exists());
        assert!(!b.exists());
        let archive = ::zip::ZipArchive::new(std::fs::File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }
}
