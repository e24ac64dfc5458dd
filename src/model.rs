// Core structs: ListingRecord, AggregateRow, TermFrequencyEntry, RunSummary
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// One scraped product listing after validation and coercion.
///
/// Immutable once built: every numeric field that could not be read from the
/// raw record stays `None` ("missing") and is excluded from averages later,
/// never treated as zero. `review_count` is the one exception: a listing
/// without reviews genuinely has zero of them.
#[derive(Debug, Clone)]
pub struct ListingRecord {
    pub title: String,
    /// Falls back to "Unknown" when the raw record carries no brand.
    pub brand: String,
    /// Breadcrumb trail, root to leaf. Never empty.
    pub category_path: Vec<String>,
    pub price_absolute: Option<f64>,
    /// Strike-through list price, when the listing was discounted.
    pub price_original: Option<f64>,
    pub package_quantity: Option<f64>,
    /// Derived: `price_absolute / package_quantity`, rounded half-up to 2dp.
    pub price_per_unit: Option<f64>,
    /// Star rating in [0, 5].
    pub rating: Option<f64>,
    pub review_count: u32,
    pub bestseller_rank: Option<u32>,
    /// Units sold over the trailing 30 days ("2K+ bought in past month").
    pub sales_velocity_30d: Option<u64>,
    pub is_sponsored: bool,
    pub has_prime: bool,
    pub bullet_points: Vec<String>,
    pub description: String,
    /// Deduplicated case-insensitively; first-seen casing and order kept.
    pub usage_claims: Vec<String>,
    pub special_ingredients: Vec<String>,
    pub asin: Option<String>,
    pub search_term: Option<String>,
    /// Position on the search results page the listing was scraped from.
    pub serp_position: Option<u32>,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Grouping dimensions the aggregation engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupDimension {
    Brand,
    Category,
    SubCategory,
    Flavor,
}

impl GroupDimension {
    pub fn label(self) -> &'static str {
        match self {
            GroupDimension::Brand => "brand",
            GroupDimension::Category => "category",
            GroupDimension::SubCategory => "sub_category",
            GroupDimension::Flavor => "flavor",
        }
    }
}

/// Metrics a grouping can request. Means and medians ignore missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    MeanPricePerUnit,
    MedianPricePerUnit,
    MeanRating,
    TotalSalesVelocity,
    MeanSalesVelocity,
    MeanReviewCount,
    MeanBestsellerRank,
    SponsoredShare,
    PrimeShare,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Metric::MeanPricePerUnit => "mean_price_per_unit",
            Metric::MedianPricePerUnit => "median_price_per_unit",
            Metric::MeanRating => "mean_rating",
            Metric::TotalSalesVelocity => "total_sales_velocity",
            Metric::MeanSalesVelocity => "mean_sales_velocity",
            Metric::MeanReviewCount => "mean_review_count",
            Metric::MeanBestsellerRank => "mean_bestseller_rank",
            Metric::SponsoredShare => "sponsored_share",
            Metric::PrimeShare => "prime_share",
        }
    }
}

/// Free-text fields that feed the token pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Title,
    BulletPoints,
    Description,
    UsageClaims,
    SpecialIngredients,
}

impl TextField {
    pub fn label(self) -> &'static str {
        match self {
            TextField::Title => "title",
            TextField::BulletPoints => "bullet_points",
            TextField::Description => "description",
            TextField::UsageClaims => "usage_claims",
            TextField::SpecialIngredients => "special_ingredients",
        }
    }
}

/// One output row of the aggregation engine.
///
/// `key` holds one display value per grouping dimension (first-seen casing).
/// A metric whose group had no usable samples is `None`, never 0 or NaN.
#[derive(Debug, Clone)]
pub struct AggregateRow {
    pub key: Vec<String>,
    pub listing_count: usize,
    pub metrics: Vec<(Metric, Option<f64>)>,
}

#[derive(Debug, Clone)]
pub struct AggregateTable {
    pub dimensions: Vec<GroupDimension>,
    pub rows: Vec<AggregateRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TermFrequencyEntry {
    pub term: String,
    pub count: u64,
    pub source_field: TextField,
}

/// Term counts for one text field, optionally restricted to one partition
/// value (e.g. a single brand).
#[derive(Debug, Clone)]
pub struct TermFrequencyTable {
    pub source_field: TextField,
    pub partition: Option<String>,
    pub entries: Vec<TermFrequencyEntry>,
}

/// Why a raw record was dropped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    MissingTitle,
    MissingCategoryPath,
}

impl SkipReason {
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::MissingTitle => "missing_title",
            SkipReason::MissingCategoryPath => "missing_category_path",
        }
    }
}

/// Data-quality audit for one full run, returned alongside the tables.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rows_read: usize,
    pub unreadable_rows: usize,
    pub records_normalized: usize,
    pub records_skipped: usize,
    pub skips_by_reason: BTreeMap<String, usize>,
    pub coercion_failures: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open dataset '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read header row of '{}': {source}", .path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("unsupported dataset extension '{extension}' (expected .csv, .json or .jsonl)")]
    UnsupportedFormat { extension: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The only fatal per-run condition: nothing survived normalization.
    #[error("empty dataset: {0}")]
    EmptyDataset(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
