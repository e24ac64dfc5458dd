//! Batch analytics over scraped pet-food listings: record validation,
//! per-unit pricing, grouped metric tables and term frequencies for
//! word-cloud rendering.

pub mod analyzer;
pub mod config;
pub mod export;
pub mod ingest;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod tokenizer;
