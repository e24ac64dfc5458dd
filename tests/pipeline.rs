use std::fs;
use std::path::{Path, PathBuf};

use petshelf_analytics::config::{AnalysisConfig, FlavorRule};
use petshelf_analytics::export::{OutputFormat, write_outputs};
use petshelf_analytics::ingest::read_dataset;
use petshelf_analytics::model::{GroupDimension, Metric, PipelineError, TextField};
use petshelf_analytics::pipeline;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn study_config() -> AnalysisConfig {
    AnalysisConfig {
        groupings: vec![
            vec![GroupDimension::Brand],
            vec![GroupDimension::Brand, GroupDimension::Flavor],
        ],
        metrics: vec![
            Metric::MeanPricePerUnit,
            Metric::MedianPricePerUnit,
            Metric::MeanRating,
            Metric::TotalSalesVelocity,
        ],
        flavor_rules: vec![
            FlavorRule {
                keyword: "chicken".to_string(),
                flavor: "Chicken".to_string(),
            },
            FlavorRule {
                keyword: "salmon".to_string(),
                flavor: "Salmon".to_string(),
            },
        ],
        term_fields: vec![TextField::Title],
        ..AnalysisConfig::default()
    }
}

fn approx(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|x| (x - expected).abs() < 1e-9)
}

#[test]
fn csv_dataset_end_to_end() {
    let dataset = read_dataset(&fixture("listings.csv")).unwrap();
    assert_eq!(dataset.records.len(), 5);
    assert_eq!(dataset.unreadable_rows, 0);

    let output = pipeline::run(&dataset, &study_config()).unwrap();

    // two rows lack title or category path and never reach the tables
    let summary = &output.summary;
    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.records_normalized, 3);
    assert_eq!(summary.records_skipped, 2);
    assert_eq!(summary.skips_by_reason.get("missing_title"), Some(&1));
    assert_eq!(summary.skips_by_reason.get("missing_category_path"), Some(&1));
    // "past month best seller" carries no usable number
    assert_eq!(summary.coercion_failures.get("sales_velocity_30d"), Some(&1));

    let by_brand = &output.aggregates[0];
    assert_eq!(by_brand.dimensions, vec![GroupDimension::Brand]);
    assert_eq!(by_brand.rows.len(), 2);

    // "Felix" and "FELIX" fold into one row under the first-seen casing
    let felix = &by_brand.rows[0];
    assert_eq!(felix.key, vec!["Felix"]);
    assert_eq!(felix.listing_count, 2);
    assert!(approx(felix.metrics[0].1, 5.0), "mean unit price");
    assert!(approx(felix.metrics[1].1, 5.0), "median unit price");
    assert!(approx(felix.metrics[2].1, 4.35), "mean rating");
    assert!(approx(felix.metrics[3].1, 2500.0), "total velocity");

    let whiskas = &by_brand.rows[1];
    assert_eq!(whiskas.key, vec!["Whiskas"]);
    // €12,99 for a 12-pack: 12.99 / 12 rounded to cents
    assert!(approx(whiskas.metrics[0].1, 1.08), "unit price from euro tag");
    assert_eq!(whiskas.metrics[3].1, None, "velocity stays missing");

    let by_flavor = &output.aggregates[1];
    let keys: Vec<Vec<String>> = by_flavor.rows.iter().map(|row| row.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            vec!["Felix".to_string(), "Chicken".to_string()],
            vec!["Whiskas".to_string(), "Salmon".to_string()],
        ]
    );

    let terms = &output.term_frequencies[0];
    assert_eq!(terms.source_field, TextField::Title);
    assert!(terms.partition.is_none());
    assert_eq!(terms.entries[0].term, "felix");
    assert_eq!(terms.entries[0].count, 2);
    assert_eq!(terms.entries[1].term, "chicken");
    assert_eq!(terms.entries[1].count, 2);
}

#[test]
fn artifacts_land_on_disk_with_missing_values_blank() {
    let dataset = read_dataset(&fixture("listings.csv")).unwrap();
    let output = pipeline::run(&dataset, &study_config()).unwrap();

    let out_dir = std::env::temp_dir().join("petshelf_pipeline_it");
    let _ = fs::remove_dir_all(&out_dir);
    let written = write_outputs(&output, &out_dir, OutputFormat::Csv).unwrap();
    assert!(written.iter().any(|p| p.ends_with("by_brand.csv")));
    assert!(written.iter().any(|p| p.ends_with("run_summary.json")));

    let body = fs::read_to_string(out_dir.join("by_brand.csv")).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(
        lines[0],
        "brand,listing_count,mean_price_per_unit,median_price_per_unit,mean_rating,total_sales_velocity"
    );
    assert!(lines[1].starts_with("Felix,2,5,5,4.35,2500"));
    // Whiskas has no velocity data: trailing cell stays empty
    assert!(lines[2].starts_with("Whiskas,1,1.08,1.08,3.9,"));
    assert!(lines[2].ends_with(','));

    fs::remove_dir_all(&out_dir).ok();
}

#[test]
fn a_dataset_with_no_usable_records_fails_loudly() {
    let dataset = read_dataset(&fixture("empty.csv")).unwrap();
    let err = pipeline::run(&dataset, &AnalysisConfig::default()).unwrap_err();
    match err {
        PipelineError::EmptyDataset(message) => {
            assert!(message.contains("no usable records"), "message: {message}");
        }
    }
}
