//! Dataset loader for the Olist CSV (or Parquet) tables
//!
//! Every table is resolved from the data directory by its fixed file name,
//! parsed with polars and checked for the columns the analyses rely on.
//! A table that fails to load is kept as an error in the [`DataCatalog`] so
//! that only the pages depending on it are affected.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;

use super::error::{DataError, DataResult};

/// The nine tables of the marketplace export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Customers,
    Geolocation,
    OrderItems,
    OrderPayments,
    OrderReviews,
    Orders,
    Products,
    Sellers,
    ProductCategories,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 9] = [
        DatasetKind::Customers,
        DatasetKind::Geolocation,
        DatasetKind::OrderItems,
        DatasetKind::OrderPayments,
        DatasetKind::OrderReviews,
        DatasetKind::Orders,
        DatasetKind::Products,
        DatasetKind::Sellers,
        DatasetKind::ProductCategories,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::Customers => "customers",
            DatasetKind::Geolocation => "geolocation",
            DatasetKind::OrderItems => "order_items",
            DatasetKind::OrderPayments => "order_payments",
            DatasetKind::OrderReviews => "order_reviews",
            DatasetKind::Orders => "orders",
            DatasetKind::Products => "products",
            DatasetKind::Sellers => "sellers",
            DatasetKind::ProductCategories => "product_categories",
        }
    }

    /// File name without extension, as published in the public dataset
    pub fn file_stem(&self) -> &'static str {
        match self {
            DatasetKind::Customers => "olist_customers_dataset",
            DatasetKind::Geolocation => "olist_geolocation_dataset",
            DatasetKind::OrderItems => "olist_order_items_dataset",
            DatasetKind::OrderPayments => "olist_order_payments_dataset",
            DatasetKind::OrderReviews => "olist_order_reviews_dataset",
            DatasetKind::Orders => "olist_orders_dataset",
            DatasetKind::Products => "olist_products_dataset",
            DatasetKind::Sellers => "olist_sellers_dataset",
            DatasetKind::ProductCategories => "product_category_name_translation",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.file_stem())
    }

    /// Columns the cleaner and the analyses read from this table
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Customers => &[
                "customer_id",
                "customer_unique_id",
                "customer_zip_code_prefix",
                "customer_city",
                "customer_state",
            ],
            DatasetKind::Geolocation => &[
                "geolocation_zip_code_prefix",
                "geolocation_lat",
                "geolocation_lng",
                "geolocation_city",
                "geolocation_state",
            ],
            DatasetKind::OrderItems => &[
                "order_id",
                "order_item_id",
                "product_id",
                "seller_id",
                "price",
                "freight_value",
            ],
            DatasetKind::OrderPayments => &[
                "order_id",
                "payment_sequential",
                "payment_type",
                "payment_installments",
                "payment_value",
            ],
            DatasetKind::OrderReviews => &["review_id", "order_id", "review_score"],
            DatasetKind::Orders => &[
                "order_id",
                "customer_id",
                "order_status",
                "order_purchase_timestamp",
                "order_approved_at",
                "order_delivered_carrier_date",
                "order_delivered_customer_date",
                "order_estimated_delivery_date",
            ],
            DatasetKind::Products => &[
                "product_id",
                "product_category_name",
                "product_weight_g",
                "product_length_cm",
                "product_height_cm",
                "product_width_cm",
            ],
            DatasetKind::Sellers => &[
                "seller_id",
                "seller_zip_code_prefix",
                "seller_city",
                "seller_state",
            ],
            DatasetKind::ProductCategories => {
                &["product_category_name", "product_category_name_english"]
            }
        }
    }

    /// Columns read as text even when every value looks numeric, so that
    /// zip prefixes keep their leading zeros
    pub fn text_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Customers => &["customer_zip_code_prefix"],
            DatasetKind::Geolocation => &["geolocation_zip_code_prefix"],
            DatasetKind::Sellers => &["seller_zip_code_prefix"],
            _ => &[],
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetKind::ALL
            .iter()
            .find(|kind| kind.name() == s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("Unknown dataset: '{}'", s))
    }
}

/// Locate the file backing a dataset. CSV wins over Parquet when both exist.
pub fn resolve_dataset_path(data_dir: &Path, kind: DatasetKind) -> DataResult<PathBuf> {
    let csv = data_dir.join(kind.file_name());
    if csv.is_file() {
        return Ok(csv);
    }
    let parquet = data_dir.join(format!("{}.parquet", kind.file_stem()));
    if parquet.is_file() {
        return Ok(parquet);
    }
    Err(DataError::MissingFile {
        dataset: kind.name().to_string(),
        path: csv,
    })
}

/// Make sure CSV bytes are UTF-8, transcoding from Windows-1252 when they are not.
///
/// Returns the (possibly transcoded) bytes and whether a fallback was applied.
pub fn decode_csv_bytes(bytes: Vec<u8>) -> (Vec<u8>, bool) {
    match String::from_utf8(bytes) {
        Ok(text) => (text.into_bytes(), false),
        Err(err) => {
            let raw = err.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&raw);
            (decoded.into_owned().into_bytes(), true)
        }
    }
}

fn header_names(bytes: &[u8]) -> Vec<String> {
    let line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    String::from_utf8_lossy(line)
        .split(',')
        .map(|name| name.trim().trim_matches('"').to_string())
        .collect()
}

/// Parse an in-memory CSV into a DataFrame, keeping the dataset's
/// [`DatasetKind::text_columns`] as strings
pub fn read_csv_bytes(
    bytes: Vec<u8>,
    kind: DatasetKind,
    infer_schema_length: usize,
) -> DataResult<DataFrame> {
    // 0 means full table scan
    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let header = header_names(&bytes);
    let overrides: Schema = kind
        .text_columns()
        .iter()
        .filter(|column| header.iter().any(|h| h == *column))
        .map(|column| Field::new((*column).into(), DataType::String))
        .collect();

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(schema_length)
        .with_schema_overwrite(Some(Arc::new(overrides)))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| DataError::parse(kind.name(), e))
}

/// Check that all required columns of a dataset are present
pub fn validate_columns(df: &DataFrame, kind: DatasetKind) -> DataResult<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for column in kind.required_columns() {
        if !present.iter().any(|p| p == column) {
            return Err(DataError::Schema {
                dataset: kind.name().to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Load and validate a single table from the data directory
pub fn load_table(
    data_dir: &Path,
    kind: DatasetKind,
    infer_schema_length: usize,
) -> DataResult<DataFrame> {
    let path = resolve_dataset_path(data_dir, kind)?;
    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false);

    let df = if is_parquet {
        let file = std::fs::File::open(&path).map_err(|e| DataError::parse(kind.name(), e))?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| DataError::parse(kind.name(), e))?
    } else {
        let bytes = std::fs::read(&path).map_err(|e| DataError::parse(kind.name(), e))?;
        let (bytes, transcoded) = decode_csv_bytes(bytes);
        if transcoded {
            tracing::warn!(
                dataset = kind.name(),
                "file is not valid UTF-8, decoded as Windows-1252"
            );
        }
        read_csv_bytes(bytes, kind, infer_schema_length)?
    };

    if df.height() == 0 {
        return Err(DataError::EmptyTable {
            dataset: kind.name().to_string(),
        });
    }
    validate_columns(&df, kind)?;

    tracing::debug!(
        dataset = kind.name(),
        rows = df.height(),
        columns = df.width(),
        "table loaded"
    );
    Ok(df)
}

/// All tables of one run, each either loaded or carrying its load error
#[derive(Debug, Default)]
pub struct DataCatalog {
    tables: BTreeMap<DatasetKind, DataResult<DataFrame>>,
}

impl DataCatalog {
    /// Load every dataset from `data_dir`; failures are recorded, not raised
    pub fn load(data_dir: &Path, infer_schema_length: usize) -> Self {
        let tables = DatasetKind::ALL
            .iter()
            .map(|&kind| (kind, load_table(data_dir, kind, infer_schema_length)))
            .collect();
        Self { tables }
    }

    pub fn insert(&mut self, kind: DatasetKind, table: DataResult<DataFrame>) {
        self.tables.insert(kind, table);
    }

    /// Borrow a loaded table, or the error that prevented loading it
    pub fn get(&self, kind: DatasetKind) -> DataResult<&DataFrame> {
        match self.tables.get(&kind) {
            Some(Ok(df)) => Ok(df),
            Some(Err(err)) => Err(err.clone()),
            None => Err(DataError::MissingFile {
                dataset: kind.name().to_string(),
                path: PathBuf::from(kind.file_name()),
            }),
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.tables.values().filter(|t| t.is_ok()).count()
    }

    pub fn errors(&self) -> Vec<(DatasetKind, &DataError)> {
        self.tables
            .iter()
            .filter_map(|(kind, t)| t.as_ref().err().map(|e| (*kind, e)))
            .collect()
    }

    pub fn loaded(&self) -> impl Iterator<Item = (DatasetKind, &DataFrame)> {
        self.tables
            .iter()
            .filter_map(|(kind, t)| t.as_ref().ok().map(|df| (*kind, df)))
    }
}

/// Size and completeness of one loaded table
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub dataset: String,
    pub rows: usize,
    pub columns: usize,
    pub memory_mb: f64,
    pub missing_cells: usize,
    pub missing_pct: f64,
}

/// Summarise every loaded table of the catalog
pub fn dataset_summary(catalog: &DataCatalog) -> Vec<DatasetSummary> {
    catalog
        .loaded()
        .map(|(kind, df)| {
            let (rows, columns) = df.shape();
            let missing_cells: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
            let total_cells = rows * columns;
            DatasetSummary {
                dataset: kind.name().to_string(),
                rows,
                columns,
                memory_mb: df.estimated_size() as f64 / (1024.0 * 1024.0),
                missing_cells,
                missing_pct: if total_cells > 0 {
                    missing_cells as f64 / total_cells as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}

/// Read only the header of a CSV or Parquet file
pub fn get_column_names(path: &Path) -> Result<Vec<String>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let schema = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(100))
            .finish()
            .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
            .collect_schema()
            .with_context(|| format!("Failed to read CSV schema: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?
            .collect_schema()
            .with_context(|| format!("Failed to read Parquet schema: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    Ok(schema.iter_names().map(|n| n.to_string()).collect())
}
