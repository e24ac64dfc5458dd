// Free-text token pipeline feeding the term-frequency tables
use std::collections::{HashMap, HashSet};

use crate::model::{ListingRecord, TextField};

/// Splits listing text into counted terms: case-fold, split on non-alphabetic
/// runs, drop stopwords, map through the lemma table, drop tokens shorter
/// than two characters.
///
/// Both tables are injected at construction and matched case-insensitively;
/// a word absent from the lemma table maps to itself. Nothing is cached
/// between calls.
pub struct TextFeatureExtractor {
    stopwords: HashSet<String>,
    lemmas: HashMap<String, String>,
}

impl TextFeatureExtractor {
    pub fn new(stopwords: &[String], lemmas: &HashMap<String, String>) -> Self {
        Self {
            stopwords: stopwords.iter().map(|word| word.to_lowercase()).collect(),
            lemmas: lemmas
                .iter()
                .map(|(from, to)| (from.to_lowercase(), to.to_lowercase()))
                .collect(),
        }
    }

    /// Lazy token stream over one text, in appearance order. Restartable:
    /// every call walks the text from the start.
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.split(|c: char| !c.is_alphabetic())
            .filter(|part| !part.is_empty())
            .map(|part| part.to_lowercase())
            .filter(move |token| !self.stopwords.contains(token))
            .map(move |token| self.lemmas.get(&token).cloned().unwrap_or(token))
            .filter(|token| token.chars().count() >= 2)
    }

    /// Tokens of one record field. Multi-value fields flatten in list order.
    pub fn field_tokens(&self, record: &ListingRecord, field: TextField) -> Vec<String> {
        match field {
            TextField::Title => self.tokens(&record.title).collect(),
            TextField::Description => self.tokens(&record.description).collect(),
            TextField::BulletPoints => self.flatten(&record.bullet_points),
            TextField::UsageClaims => self.flatten(&record.usage_claims),
            TextField::SpecialIngredients => self.flatten(&record.special_ingredients),
        }
    }

    fn flatten(&self, values: &[String]) -> Vec<String> {
        values.iter().flat_map(|value| self.tokens(value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(stopwords: &[&str], lemmas: &[(&str, &str)]) -> TextFeatureExtractor {
        let stopwords: Vec<String> = stopwords.iter().map(|s| s.to_string()).collect();
        let lemmas: HashMap<String, String> = lemmas
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        TextFeatureExtractor::new(&stopwords, &lemmas)
    }

    fn collect(extractor: &TextFeatureExtractor, text: &str) -> Vec<String> {
        extractor.tokens(text).collect()
    }

    #[test]
    fn splits_on_non_alphabetic_runs_and_lowercases() {
        let ex = extractor(&[], &[]);
        assert_eq!(
            collect(&ex, "Whiskas 12x85g Adult, Chicken!"),
            vec!["whiskas", "adult", "chicken"]
        );
    }

    #[test]
    fn stopwords_are_dropped_before_lemmatization() {
        // "with" is a stopword; "cats" lemmatizes to "cat"
        let ex = extractor(&["with"], &[("cats", "cat")]);
        assert_eq!(
            collect(&ex, "food with cats"),
            vec!["food", "cat"]
        );
    }

    #[test]
    fn stopword_match_is_case_insensitive() {
        let ex = extractor(&["AND"], &[]);
        assert_eq!(collect(&ex, "Beef and Liver"), vec!["beef", "liver"]);
    }

    #[test]
    fn length_filter_runs_after_the_lemma_table() {
        // a lemma output of one character falls to the length filter
        let ex = extractor(&[], &[("grams", "g")]);
        assert_eq!(collect(&ex, "eighty grams beef"), vec!["eighty", "beef"]);
    }

    #[test]
    fn single_letters_never_survive() {
        let ex = extractor(&[], &[]);
        assert_eq!(collect(&ex, "a b vitamin c"), vec!["vitamin"]);
    }

    #[test]
    fn retokenizing_own_output_is_identity() {
        let ex = extractor(&["with", "for"], &[("kittens", "kitten"), ("kitten", "kitten")]);
        let first = collect(&ex, "Tasty Chunks for Kittens with Salmon");
        let second: Vec<String> = first
            .iter()
            .flat_map(|token| ex.tokens(token))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn token_stream_is_restartable() {
        let ex = extractor(&[], &[]);
        let text = "salmon trout herring";
        assert_eq!(collect(&ex, text), collect(&ex, text));
    }

    #[test]
    fn multi_value_fields_flatten_in_list_order() {
        let ex = extractor(&[], &[]);
        let record = ListingRecord {
            title: "Cat Food".to_string(),
            brand: "Felix".to_string(),
            category_path: vec!["Pet Supplies".to_string()],
            price_absolute: None,
            price_original: None,
            package_quantity: None,
            price_per_unit: None,
            rating: None,
            review_count: 0,
            bestseller_rank: None,
            sales_velocity_30d: None,
            is_sponsored: false,
            has_prime: false,
            bullet_points: vec!["High protein".to_string(), "No fillers".to_string()],
            description: String::new(),
            usage_claims: Vec::new(),
            special_ingredients: Vec::new(),
            asin: None,
            search_term: None,
            serp_position: None,
            scraped_at: None,
        };
        assert_eq!(
            ex.field_tokens(&record, TextField::BulletPoints),
            vec!["high", "protein", "no", "fillers"]
        );
        assert_eq!(ex.field_tokens(&record, TextField::Title), vec!["cat", "food"]);
    }
}
