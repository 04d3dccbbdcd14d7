//! Tests for CLI argument parsing and the compiled binary

use assert_cmd::Command;
use clap::Parser;
use ecomlens::cli::{Cli, Commands};
use ecomlens::pipeline::DatasetKind;
use ecomlens::report::{Page, REPORT_FILE};
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

fn ecomlens() -> Command {
    Command::cargo_bin("ecomlens").unwrap()
}

#[test]
fn test_cli_output_dir_derivation() {
    let cli = Cli::parse_from(["ecomlens", "-d", "/path/to/olist"]);
    assert_eq!(cli.output_dir(), PathBuf::from("/path/to/olist_report"));

    let cli = Cli::parse_from(["ecomlens", "-d", "/path/to/olist", "-o", "/tmp/out"]);
    assert_eq!(cli.output_dir(), PathBuf::from("/tmp/out"));
}

#[test]
fn test_cli_page_selection() {
    let cli = Cli::parse_from(["ecomlens", "--pages", "market,customers"]);
    assert_eq!(cli.pages(), vec![Page::Market, Page::Customers]);

    assert!(Cli::try_parse_from(["ecomlens", "--pages", "inventory"]).is_err());
    assert!(Cli::try_parse_from(["ecomlens", "--forecast-trees", "0"]).is_err());
}

#[test]
fn test_cli_generate_subcommand() {
    let cli = Cli::parse_from(["ecomlens", "generate", "/tmp/synthetic", "--customers", "50"]);
    match cli.command {
        Some(Commands::Generate {
            output_dir,
            customers,
            seed,
        }) => {
            assert_eq!(output_dir, PathBuf::from("/tmp/synthetic"));
            assert_eq!(customers, 50);
            assert_eq!(seed, 42);
        }
        other => panic!("Expected generate subcommand, got {:?}", other),
    }
}

#[test]
fn test_binary_generate_then_analyse() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("olist");

    ecomlens()
        .args(["generate", data.to_str().unwrap(), "--customers", "200", "--seed", "3"])
        .assert()
        .success();
    for kind in DatasetKind::ALL {
        assert!(data.join(kind.file_name()).exists(), "{} not generated", kind);
    }

    let out = dir.path().join("report");
    ecomlens()
        .args(["-d", data.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .args(["--no-confirm", "--table-format", "csv", "--forecast-trees", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains(Page::Customers.title()));

    assert!(out.join(REPORT_FILE).exists());
    assert!(out.join("customer_metrics.csv").exists());
}

#[test]
fn test_binary_no_export_writes_nothing() {
    let data = common::generated_dataset_dir(150, 4);
    let out = TempDir::new().unwrap();
    let target = out.path().join("report");

    ecomlens()
        .args(["-d", data.path().to_str().unwrap(), "-o", target.to_str().unwrap()])
        .args(["--no-export", "--pages", "overview", "--forecast-trees", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Export skipped"));
    assert!(!target.exists());
}

#[test]
fn test_binary_missing_directory_degrades() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nowhere");

    ecomlens()
        .args(["-d", missing.to_str().unwrap(), "--no-export", "--pages", "payments"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Page unavailable"));
}

#[test]
fn test_binary_validate_reports_datasets() {
    let data = common::sample_dataset_dir();
    ecomlens()
        .args(["validate", "-d", data.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("order_payments"));
}

#[test]
fn test_binary_clean_writes_loadable_tables() {
    let data = common::sample_dataset_dir();
    let out = TempDir::new().unwrap();
    let target = out.path().join("clean");

    ecomlens()
        .args(["--no-confirm", "clean", "-d", data.path().to_str().unwrap()])
        .args(["-o", target.to_str().unwrap(), "--format", "csv"])
        .assert()
        .success();

    let catalog = ecomlens::pipeline::DataCatalog::load(&target, 100);
    assert_eq!(catalog.loaded_count(), 8, "Cleaned tables reload without translations");
    let orders = catalog.get(DatasetKind::Orders).unwrap();
    assert_eq!(orders.height(), 5);
}
