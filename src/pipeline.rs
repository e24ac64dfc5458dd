// One batch run: normalize, aggregate, count terms
use chrono::Utc;
use tracing::info;

use crate::analyzer::{AggregationEngine, FlavorClassifier, FrequencyAnalyzer};
use crate::config::AnalysisConfig;
use crate::ingest::Dataset;
use crate::model::{
    AggregateTable, ListingRecord, PipelineError, RunSummary, TermFrequencyTable,
};
use crate::normalizer::RecordNormalizer;
use crate::tokenizer::TextFeatureExtractor;

/// Everything one run produces. Tables are computed fresh per run; nothing
/// carries over to the next.
#[derive(Debug)]
pub struct AnalysisOutput {
    pub aggregates: Vec<AggregateTable>,
    pub term_frequencies: Vec<TermFrequencyTable>,
    pub summary: RunSummary,
}

/// Runs the full analysis over one dataset. Single-threaded; per-record
/// problems are absorbed into the summary, and only a dataset with zero
/// usable records is an error.
pub fn run(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnalysisOutput, PipelineError> {
    let started_at = Utc::now();
    let rows_read = dataset.records.len() + dataset.unreadable_rows;

    let mut normalizer = RecordNormalizer::new();
    let mut records: Vec<ListingRecord> = Vec::new();
    for raw in &dataset.records {
        if let Ok(record) = normalizer.normalize(raw) {
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no usable records ({} rows read, {} unreadable, {} skipped during normalization)",
            rows_read,
            dataset.unreadable_rows,
            normalizer.records_skipped()
        )));
    }

    info!(
        records = records.len(),
        skipped = normalizer.records_skipped(),
        "normalization finished"
    );

    let engine = AggregationEngine::new(FlavorClassifier::new(&config.flavor_rules));
    let aggregates: Vec<AggregateTable> = config
        .groupings
        .iter()
        .map(|dimensions| engine.aggregate(&records, dimensions, &config.metrics))
        .collect();

    let extractor = TextFeatureExtractor::new(&config.stopwords, &config.lemmas);
    let analyzer = FrequencyAnalyzer::new(config.top_terms);
    let mut term_frequencies: Vec<TermFrequencyTable> = Vec::new();
    for field in &config.term_fields {
        let sequences: Vec<(Option<String>, Vec<String>)> = records
            .iter()
            .map(|record| {
                let partition = config
                    .term_partition
                    .map(|dimension| engine.dimension_value(record, dimension));
                (partition, extractor.field_tokens(record, *field))
            })
            .collect();
        term_frequencies.extend(analyzer.analyze(*field, &sequences));
    }

    info!(
        aggregate_tables = aggregates.len(),
        term_tables = term_frequencies.len(),
        "analysis finished"
    );

    let summary = RunSummary {
        rows_read,
        unreadable_rows: dataset.unreadable_rows,
        records_normalized: records.len(),
        records_skipped: normalizer.records_skipped(),
        skips_by_reason: normalizer.skips_by_reason(),
        coercion_failures: normalizer.coercion_failures(),
        started_at,
        finished_at: Utc::now(),
    };

    Ok(AnalysisOutput {
        aggregates,
        term_frequencies,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlavorRule;
    use crate::ingest::RawRecord;
    use crate::model::{GroupDimension, Metric, TextField};
    use serde_json::{Value, json};

    fn raw(pairs: &[(&str, Value)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn dataset(records: Vec<RawRecord>) -> Dataset {
        Dataset {
            records,
            unreadable_rows: 0,
        }
    }

    #[test]
    fn empty_dataset_is_the_only_fatal_condition() {
        let err = run(&dataset(Vec::new()), &AnalysisConfig::default()).unwrap_err();
        match err {
            PipelineError::EmptyDataset(message) => {
                assert!(message.contains("0 rows read"), "message was: {message}");
            }
        }
    }

    #[test]
    fn all_records_skipped_still_reports_empty() {
        let records = vec![raw(&[("price", json!("9.99"))])];
        let err = run(&dataset(records), &AnalysisConfig::default()).unwrap_err();
        match err {
            PipelineError::EmptyDataset(message) => {
                assert!(message.contains("1 skipped"), "message was: {message}");
            }
        }
    }

    #[test]
    fn skipped_records_never_reach_the_tables() {
        let records = vec![
            raw(&[
                ("title", json!("Felix Chicken 10x85g")),
                ("brand", json!("Felix")),
                ("categories", json!("Pet Supplies|Cat Food")),
                ("price", json!(10.0)),
                ("package_quantity", json!(2.0)),
            ]),
            // no category path: skipped
            raw(&[("title", json!("Mystery Pack")), ("brand", json!("Felix"))]),
        ];
        let output = run(&dataset(records), &AnalysisConfig::default()).unwrap();
        assert_eq!(output.summary.records_normalized, 1);
        assert_eq!(output.summary.records_skipped, 1);
        assert_eq!(
            output.summary.skips_by_reason.get("missing_category_path"),
            Some(&1)
        );
        assert_eq!(output.aggregates[0].rows.len(), 1);
        assert_eq!(output.aggregates[0].rows[0].listing_count, 1);
    }

    #[test]
    fn groupings_metrics_and_term_tables_follow_the_config() {
        let records = vec![
            raw(&[
                ("title", json!("Felix Chicken Dinner")),
                ("brand", json!("Felix")),
                ("categories", json!("Pet Supplies|Cat Food")),
                ("price", json!(10.0)),
                ("package_quantity", json!(2.0)),
            ]),
            raw(&[
                ("title", json!("Felix Salmon Feast")),
                ("brand", json!("FELIX")),
                ("categories", json!("Pet Supplies|Cat Food")),
                ("price", json!(20.0)),
                ("package_quantity", json!(4.0)),
            ]),
            raw(&[
                ("title", json!("Whiskas Chicken Bites")),
                ("brand", json!("Whiskas")),
                ("categories", json!("Pet Supplies|Cat Food")),
            ]),
        ];
        let config = AnalysisConfig {
            groupings: vec![vec![GroupDimension::Brand], vec![GroupDimension::Flavor]],
            metrics: vec![Metric::MeanPricePerUnit],
            stopwords: vec!["dinner".to_string(), "feast".to_string(), "bites".to_string()],
            flavor_rules: vec![FlavorRule {
                keyword: "chicken".to_string(),
                flavor: "Chicken".to_string(),
            }],
            term_fields: vec![TextField::Title],
            term_partition: Some(GroupDimension::Brand),
            top_terms: 10,
            ..AnalysisConfig::default()
        };

        let output = run(&dataset(records), &config).unwrap();

        assert_eq!(output.aggregates.len(), 2);
        let by_brand = &output.aggregates[0];
        assert_eq!(by_brand.rows.len(), 2);
        assert_eq!(by_brand.rows[0].key, vec!["Felix"]);
        assert_eq!(by_brand.rows[0].listing_count, 2);
        assert_eq!(by_brand.rows[0].metrics[0].1, Some(5.0));
        // records without price keep their row but report no unit price
        assert_eq!(by_brand.rows[1].key, vec!["Whiskas"]);
        assert_eq!(by_brand.rows[1].metrics[0].1, None);

        let by_flavor = &output.aggregates[1];
        let flavors: Vec<&str> = by_flavor.rows.iter().map(|r| r.key[0].as_str()).collect();
        assert_eq!(flavors, vec!["Chicken", "unclassified"]);

        // one term table per brand partition, case variants folded
        assert_eq!(output.term_frequencies.len(), 2);
        let felix = &output.term_frequencies[0];
        assert_eq!(felix.partition.as_deref(), Some("Felix"));
        assert_eq!(felix.entries[0].term, "felix");
        assert_eq!(felix.entries[0].count, 2);
    }

    #[test]
    fn summary_accounts_for_every_row() {
        let records = vec![
            raw(&[
                ("title", json!("Felix Pack")),
                ("categories", json!("Pet Supplies")),
                ("rating", json!("not a rating")),
            ]),
            raw(&[("categories", json!("Pet Supplies"))]),
        ];
        let input = Dataset {
            records,
            unreadable_rows: 3,
        };
        let output = run(&input, &AnalysisConfig::default()).unwrap();
        let summary = &output.summary;
        assert_eq!(summary.rows_read, 5);
        assert_eq!(summary.unreadable_rows, 3);
        assert_eq!(summary.records_normalized, 1);
        assert_eq!(summary.records_skipped, 1);
        assert_eq!(summary.coercion_failures.get("rating"), Some(&1));
        assert!(summary.finished_at >= summary.started_at);
    }
}
