// Grouped metric tables over normalized listings
use std::collections::HashMap;

use crate::config::FlavorRule;
use crate::model::{AggregateRow, AggregateTable, GroupDimension, ListingRecord, Metric};

/// Flavor bucket for listings no classification rule matches.
pub const UNCLASSIFIED_FLAVOR: &str = "unclassified";

/// Bucket for records whose dimension value is missing. Such records stay in
/// every aggregate; they are never dropped.
const UNKNOWN_BUCKET: &str = "Unknown";

/// Ordered keyword rules mapping listing text to a canonical flavor.
///
/// The title is searched before the description; within each text the first
/// rule that matches wins, so put specific keywords before generic ones.
pub struct FlavorClassifier {
    rules: Vec<(String, String)>,
}

impl FlavorClassifier {
    pub fn new(rules: &[FlavorRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|rule| (rule.keyword.to_lowercase(), rule.flavor.clone()))
                .collect(),
        }
    }

    pub fn classify(&self, record: &ListingRecord) -> &str {
        self.match_text(&record.title)
            .or_else(|| self.match_text(&record.description))
            .unwrap_or(UNCLASSIFIED_FLAVOR)
    }

    fn match_text(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, flavor)| flavor.as_str())
    }
}

/// Computes one aggregate table per requested grouping.
///
/// Groups fold case-insensitively; the displayed key keeps the first-seen
/// casing and rows come out in first-seen order, so a given input order
/// always produces the same table.
pub struct AggregationEngine {
    flavors: FlavorClassifier,
}

impl AggregationEngine {
    pub fn new(flavors: FlavorClassifier) -> Self {
        Self { flavors }
    }

    pub fn aggregate(
        &self,
        records: &[ListingRecord],
        dimensions: &[GroupDimension],
        metrics: &[Metric],
    ) -> AggregateTable {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut keys: Vec<Vec<String>> = Vec::new();
        let mut groups: Vec<Vec<&ListingRecord>> = Vec::new();

        for record in records {
            let key: Vec<String> = dimensions
                .iter()
                .map(|dimension| self.dimension_value(record, *dimension))
                .collect();
            let folded = fold_key(&key);
            let slot = *slots.entry(folded).or_insert_with(|| {
                keys.push(key.clone());
                groups.push(Vec::new());
                keys.len() - 1
            });
            groups[slot].push(record);
        }

        let rows = keys
            .into_iter()
            .zip(groups)
            .map(|(key, group)| AggregateRow {
                key,
                listing_count: group.len(),
                metrics: metrics
                    .iter()
                    .map(|metric| (*metric, compute_metric(&group, *metric)))
                    .collect(),
            })
            .collect();

        AggregateTable {
            dimensions: dimensions.to_vec(),
            rows,
        }
    }

    /// Display value of one dimension for one record.
    pub fn dimension_value(&self, record: &ListingRecord, dimension: GroupDimension) -> String {
        match dimension {
            GroupDimension::Brand => record.brand.clone(),
            GroupDimension::Category => record
                .category_path
                .first()
                .cloned()
                .unwrap_or_else(|| UNKNOWN_BUCKET.to_string()),
            GroupDimension::SubCategory => record
                .category_path
                .get(1)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_BUCKET.to_string()),
            GroupDimension::Flavor => self.flavors.classify(record).to_string(),
        }
    }
}

// Unit separator keeps multi-dimension fold keys unambiguous.
fn fold_key(key: &[String]) -> String {
    key.iter()
        .map(|value| value.to_lowercase())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// A metric over a group with no usable samples is missing, never 0 or NaN.
fn compute_metric(group: &[&ListingRecord], metric: Metric) -> Option<f64> {
    match metric {
        Metric::MeanPricePerUnit => mean(&samples(group, |r| r.price_per_unit)),
        Metric::MedianPricePerUnit => median(&samples(group, |r| r.price_per_unit)),
        Metric::MeanRating => mean(&samples(group, |r| r.rating)),
        Metric::TotalSalesVelocity => {
            let velocities = samples(group, |r| r.sales_velocity_30d.map(|v| v as f64));
            if velocities.is_empty() {
                None
            } else {
                Some(velocities.iter().sum())
            }
        }
        Metric::MeanSalesVelocity => {
            mean(&samples(group, |r| r.sales_velocity_30d.map(|v| v as f64)))
        }
        Metric::MeanReviewCount => mean(&samples(group, |r| Some(f64::from(r.review_count)))),
        Metric::MeanBestsellerRank => {
            mean(&samples(group, |r| r.bestseller_rank.map(f64::from)))
        }
        Metric::SponsoredShare => share(group, |r| r.is_sponsored),
        Metric::PrimeShare => share(group, |r| r.has_prime),
    }
}

fn samples(group: &[&ListingRecord], value: impl Fn(&ListingRecord) -> Option<f64>) -> Vec<f64> {
    group.iter().filter_map(|record| value(record)).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn share(group: &[&ListingRecord], flag: impl Fn(&ListingRecord) -> bool) -> Option<f64> {
    if group.is_empty() {
        return None;
    }
    let hits = group.iter().filter(|record| flag(record)).count();
    Some(hits as f64 / group.len() as f64)
}
