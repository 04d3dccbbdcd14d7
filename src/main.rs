//! ecomlens: Olist e-commerce business intelligence CLI
//!
//! Loads the marketplace tables, cleans them, runs the customer, seasonal,
//! forecasting, market and payment analyses and renders them as terminal
//! dashboard pages, with optional JSON/CSV/Parquet exports.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use console::style;

use ecomlens::cli::{
    confirm_overwrite, generate_dataset, run_clean, run_validate, sibling_dir, Cli, Commands,
};
use ecomlens::pipeline::{
    clean_catalog, load_table, run_analysis, AnalysisOptions, CleanOptions, DataCatalog,
    DatasetKind,
};
use ecomlens::report::{export_outputs, render_page, AnalysisReport, ReportMetadata, RunSummary};
use ecomlens::utils::{
    create_progress_bar, create_spinner, finish_with_success, finish_with_warning, init_tracing,
    print_banner, print_completion, print_config, print_count, print_info, print_step_header,
    print_step_time, print_success, print_warning,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Validate {
                data_dir,
                infer_schema_length,
            } => {
                print_banner(env!("CARGO_PKG_VERSION"));
                run_validate(data_dir, *infer_schema_length).map(|_| ())
            }
            Commands::Clean {
                data_dir,
                output_dir,
                format,
                impute_delivery_dates,
                infer_schema_length,
            } => {
                let output_dir = output_dir
                    .clone()
                    .unwrap_or_else(|| sibling_dir(data_dir, "clean"));
                if !confirm_overwrite(&output_dir, cli.no_confirm)? {
                    println!("Cancelled by user.");
                    return Ok(());
                }
                let options = CleanOptions {
                    impute_delivery_dates: *impute_delivery_dates,
                };
                run_clean(data_dir, &output_dir, *format, options, *infer_schema_length).map(|_| ())
            }
            Commands::Generate {
                output_dir,
                customers,
                seed,
            } => {
                let spinner = create_spinner("Generating synthetic dataset...");
                let counts = generate_dataset(output_dir, *customers, *seed)?;
                finish_with_success(
                    &spinner,
                    &format!("Dataset written to {}", output_dir.display()),
                );
                print_count("customers", counts.customers, None);
                print_count("orders", counts.orders, Some(&format!("({} items)", counts.order_items)));
                print_count("sellers", counts.sellers, None);
                Ok(())
            }
        };
    }

    let pages = cli.pages();
    let output_dir = (!cli.no_export).then(|| cli.output_dir());

    // Print styled banner
    print_banner(env!("CARGO_PKG_VERSION"));

    // Print configuration card
    let page_names: Vec<&str> = pages.iter().map(|p| p.name()).collect();
    print_config(
        &cli.data_dir,
        output_dir.as_deref(),
        &page_names.join(", "),
        &cli.frequency_axis.to_string(),
    );

    if let Some(dir) = &output_dir {
        if !confirm_overwrite(dir, cli.no_confirm)? {
            println!("Cancelled by user.");
            return Ok(());
        }
    }

    let mut summary = RunSummary::new();

    // Step 1: Load datasets
    print_step_header(1, "Load Datasets");

    let step_start = Instant::now();
    let pb = create_progress_bar(DatasetKind::ALL.len() as u64, "Loading");
    let mut catalog = DataCatalog::default();
    for kind in DatasetKind::ALL {
        pb.set_message(format!("Loading {}", kind));
        catalog.insert(kind, load_table(&cli.data_dir, kind, cli.infer_schema_length));
        pb.inc(1);
    }
    let failures = catalog.errors();
    if failures.is_empty() {
        finish_with_success(&pb, "All datasets loaded");
    } else {
        finish_with_warning(&pb, &format!("{} dataset(s) unavailable", failures.len()));
        for (_, err) in &failures {
            print_warning(&err.to_string());
        }
    }
    summary.datasets_loaded = catalog.loaded_count();
    summary.datasets_failed = failures.iter().map(|(kind, _)| kind.to_string()).collect();
    print_count("dataset(s)", catalog.loaded_count(), Some(&format!("in {}", cli.data_dir.display())));

    let elapsed = step_start.elapsed();
    summary.record_time("Load", elapsed);
    print_step_time(elapsed);

    // Step 2: Clean
    print_step_header(2, "Clean Data");

    let step_start = Instant::now();
    let spinner = create_spinner("Cleaning tables...");
    let cleaned = clean_catalog(
        &catalog,
        CleanOptions {
            impute_delivery_dates: cli.impute_delivery_dates,
        },
    );
    finish_with_success(&spinner, "Cleaning complete");
    summary.cleaning_actions = cleaned.log.len();
    if cleaned.log.is_empty() {
        print_info("No cleaning actions were needed");
    } else {
        print_count("cleaning action(s)", cleaned.log.len(), Some("(use -v for details)"));
    }

    let elapsed = step_start.elapsed();
    summary.record_time("Clean", elapsed);
    print_step_time(elapsed);

    // Step 3: Analyses
    print_step_header(3, "Run Analyses");

    let step_start = Instant::now();
    let options = AnalysisOptions {
        frequency_axis: cli.frequency_axis,
        forest_trees: cli.forecast_trees,
        seed: cli.seed,
    };
    let spinner = create_spinner("Scoring customers, fitting forests and ranking markets...");
    let results = run_analysis(&cleaned, &options);
    finish_with_success(&spinner, "Analyses complete");

    let elapsed = step_start.elapsed();
    summary.record_time("Analyze", elapsed);
    print_step_time(elapsed);

    // Step 4: Dashboard
    print_step_header(4, "Dashboard");

    let step_start = Instant::now();
    for page in &pages {
        let ok = render_page(*page, &results);
        summary.add_page(page.name(), ok);
    }
    let elapsed = step_start.elapsed();
    summary.record_time("Render", elapsed);

    // Step 5: Export
    if let Some(dir) = &output_dir {
        print_step_header(5, "Export Results");

        let step_start = Instant::now();
        let spinner = create_spinner("Writing report and tables...");
        let metadata = ReportMetadata::new(&cli.data_dir, &pages, cli.table_format, &options);
        let report = AnalysisReport::new(metadata, &catalog, &cleaned.log, &results);
        let files = export_outputs(&report, &results, dir, cli.table_format, cli.bundle)?;
        finish_with_success(&spinner, &format!("Saved to {}", dir.display()));
        for file in &files {
            println!("      {} {}", style("•").dim(), file.display());
        }
        summary.exported_files = files.iter().map(|f| f.display().to_string()).collect();

        let elapsed = step_start.elapsed();
        summary.record_time("Export", elapsed);
        print_step_time(elapsed);
    } else {
        print_success("Export skipped (--no-export)");
    }

    // Display summary
    summary.display();

    // Final completion message
    print_completion();

    Ok(())
}
