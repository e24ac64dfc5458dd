// Analyzer module: aggregates submodules for the different analysis stages.

pub mod aggregation;
pub mod frequency;
pub mod unit_price;

// Re-export the main engines for ease of use.
pub use aggregation::{AggregationEngine, FlavorClassifier};
pub use frequency::FrequencyAnalyzer;
