//! Tests for loading the Olist tables

use ecomlens::pipeline::{
    dataset_summary, decode_csv_bytes, get_column_names, load_table, DataCatalog, DataError,
    DatasetKind,
};
use polars::prelude::*;
use std::io::Write;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

#[test]
fn test_load_sample_dataset() {
    let dir = common::sample_dataset_dir();
    let catalog = DataCatalog::load(dir.path(), 100);

    assert_eq!(catalog.loaded_count(), 9, "All nine tables should load");
    assert!(catalog.errors().is_empty());

    let orders = catalog.get(DatasetKind::Orders).unwrap();
    assert_eq!(orders.height(), 6, "Raw orders keep the duplicate row");
}

#[test]
fn test_missing_file_names_the_file() {
    let dir = common::sample_dataset_dir();
    std::fs::remove_file(dir.path().join(DatasetKind::Sellers.file_name())).unwrap();

    let err = load_table(dir.path(), DatasetKind::Sellers, 100).unwrap_err();
    assert!(
        matches!(err, DataError::MissingFile { .. }),
        "Expected MissingFile, got {:?}",
        err
    );
    assert!(
        err.to_string().contains("olist_sellers_dataset.csv"),
        "Message should name the file: {}",
        err
    );

    // Other tables are unaffected
    let catalog = DataCatalog::load(dir.path(), 100);
    assert_eq!(catalog.loaded_count(), 8);
    assert_eq!(catalog.errors().len(), 1);
}

#[test]
fn test_missing_column_names_dataset_and_column() {
    let dir = TempDir::new().unwrap();
    common::write_csv(
        dir.path(),
        DatasetKind::OrderReviews,
        "review_id,order_id",
        &["r1,o1"],
    );

    let err = load_table(dir.path(), DatasetKind::OrderReviews, 100).unwrap_err();
    match &err {
        DataError::Schema { dataset, column } => {
            assert_eq!(dataset, "order_reviews");
            assert_eq!(column, "review_score");
        }
        other => panic!("Expected Schema error, got {:?}", other),
    }
}

#[test]
fn test_empty_table_is_an_error() {
    let dir = TempDir::new().unwrap();
    common::write_csv(
        dir.path(),
        DatasetKind::Sellers,
        "seller_id,seller_zip_code_prefix,seller_city,seller_state",
        &[],
    );

    let err = load_table(dir.path(), DatasetKind::Sellers, 100).unwrap_err();
    assert!(matches!(err, DataError::EmptyTable { .. }), "got {:?}", err);
}

#[test]
fn test_latin1_file_is_transcoded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DatasetKind::Sellers.file_name());
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "seller_id,seller_zip_code_prefix,seller_city,seller_state").unwrap();
    // "são paulo" with ã encoded as the single Latin-1 byte 0xE3
    file.write_all(b"s1,01001,s\xe3o paulo,SP\n").unwrap();
    drop(file);

    let df = load_table(dir.path(), DatasetKind::Sellers, 100).unwrap();
    let city = df.column("seller_city").unwrap().str().unwrap().get(0).unwrap().to_string();
    assert_eq!(city, "são paulo");
}

#[test]
fn test_zip_prefixes_keep_leading_zeros() {
    let dir = TempDir::new().unwrap();
    common::write_csv(
        dir.path(),
        DatasetKind::Customers,
        "customer_id,customer_unique_id,customer_zip_code_prefix,customer_city,customer_state",
        &["c1,u1,01001,sao paulo,SP", "c2,u2,20001,rio de janeiro,RJ"],
    );

    let df = load_table(dir.path(), DatasetKind::Customers, 100).unwrap();
    let zips = df.column("customer_zip_code_prefix").unwrap();
    assert_eq!(zips.dtype(), &DataType::String, "Zip prefixes must not be inferred as integers");
    assert_eq!(zips.str().unwrap().get(0), Some("01001"));

    let customers = ecomlens::pipeline::records::Customer::from_frame(&df).unwrap();
    assert_eq!(customers[0].zip_prefix, "01001");
    assert_eq!(customers[1].zip_prefix, "20001");
}

#[test]
fn test_decode_keeps_valid_utf8() {
    let (bytes, transcoded) = decode_csv_bytes("a,b\nã,1\n".as_bytes().to_vec());
    assert!(!transcoded);
    assert_eq!(String::from_utf8(bytes).unwrap(), "a,b\nã,1\n");
}

#[test]
fn test_parquet_with_same_stem_is_accepted() {
    let dir = TempDir::new().unwrap();
    let mut df = df! {
        "seller_id" => ["s1", "s2"],
        "seller_zip_code_prefix" => ["01001", "20001"],
        "seller_city" => ["sao paulo", "rio de janeiro"],
        "seller_state" => ["SP", "RJ"],
    }
    .unwrap();
    let path = dir.path().join("olist_sellers_dataset.parquet");
    let file = std::fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();

    let loaded = load_table(dir.path(), DatasetKind::Sellers, 100).unwrap();
    assert_eq!(loaded.height(), 2);
}

#[test]
fn test_dataset_summary_counts_missing_cells() {
    let dir = common::sample_dataset_dir();
    let catalog = DataCatalog::load(dir.path(), 100);
    let summary = dataset_summary(&catalog);

    assert_eq!(summary.len(), 9);
    let products = summary.iter().find(|s| s.dataset == "products").unwrap();
    assert_eq!(products.rows, 4);
    assert_eq!(products.columns, 6);
    // p3 misses its category and length
    assert_eq!(products.missing_cells, 2);
    assert!(products.missing_pct > 0.0);
}

#[test]
fn test_get_column_names_reads_header() {
    let dir = common::sample_dataset_dir();
    let columns = get_column_names(&dir.path().join(DatasetKind::Sellers.file_name())).unwrap();
    assert_eq!(
        columns,
        vec!["seller_id", "seller_zip_code_prefix", "seller_city", "seller_state"]
    );
}
