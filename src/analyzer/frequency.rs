// Term-frequency tables for word-cloud rendering
use std::collections::HashMap;

use crate::model::{TermFrequencyEntry, TermFrequencyTable, TextField};

/// Counts terms of one text field, optionally split by a partition value
/// (e.g. one table per brand). Counting is pure accumulation; all linguistic
/// work happened in the token pipeline.
pub struct FrequencyAnalyzer {
    top_terms: usize,
}

impl FrequencyAnalyzer {
    pub fn new(top_terms: usize) -> Self {
        Self { top_terms }
    }

    /// One table per distinct partition value, partitions and terms both in
    /// first-seen order. `None` partitions (ungrouped runs) land in a single
    /// table. Each table keeps the top `top_terms` entries, sorted by count
    /// descending with ties broken by first appearance.
    pub fn analyze(
        &self,
        field: TextField,
        sequences: &[(Option<String>, Vec<String>)],
    ) -> Vec<TermFrequencyTable> {
        let mut slots: HashMap<Option<String>, usize> = HashMap::new();
        let mut partitions: Vec<Option<String>> = Vec::new();
        let mut counters: Vec<TermCounter> = Vec::new();

        for (partition, tokens) in sequences {
            let folded = partition.as_ref().map(|value| value.to_lowercase());
            let slot = *slots.entry(folded).or_insert_with(|| {
                partitions.push(partition.clone());
                counters.push(TermCounter::new());
                counters.len() - 1
            });
            for token in tokens {
                counters[slot].add(token);
            }
        }

        partitions
            .into_iter()
            .zip(counters)
            .map(|(partition, counter)| TermFrequencyTable {
                source_field: field,
                partition,
                entries: counter.into_entries(field, self.top_terms),
            })
            .collect()
    }
}

/// Term counts in first-seen order.
struct TermCounter {
    slots: HashMap<String, usize>,
    terms: Vec<String>,
    counts: Vec<u64>,
}

impl TermCounter {
    fn new() -> Self {
        Self {
            slots: HashMap::new(),
            terms: Vec::new(),
            counts: Vec::new(),
        }
    }

    fn add(&mut self, term: &str) {
        match self.slots.get(term) {
            Some(&slot) => self.counts[slot] += 1,
            None => {
                self.slots.insert(term.to_string(), self.terms.len());
                self.terms.push(term.to_string());
                self.counts.push(1);
            }
        }
    }

    fn into_entries(self, field: TextField, top: usize) -> Vec<TermFrequencyEntry> {
        let mut order: Vec<usize> = (0..self.terms.len()).collect();
        order.sort_by(|&a, &b| self.counts[b].cmp(&self.counts[a]).then(a.cmp(&b)));
        order.truncate(top);
        order
            .into_iter()
            .map(|slot| TermFrequencyEntry {
                term: self.terms[slot].clone(),
                count: self.counts[slot],
                source_field: field,
            })
            .collect()
    }
}
