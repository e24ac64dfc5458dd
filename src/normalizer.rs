// Raw record -> ListingRecord validation and coercion
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::analyzer::unit_price::derive_unit_price;
use crate::ingest::RawRecord;
use crate::model::{ListingRecord, SkipReason};

/// Brand bucket for records that carry no readable brand.
pub const UNKNOWN_BRAND: &str = "Unknown";

/// Turns raw scraped records into validated `ListingRecord`s.
///
/// Per-record problems never abort a run. A record missing its title or
/// category path is skipped and counted; a field that fails to coerce goes
/// missing and is counted per field. The counters cover one run; build a new
/// normalizer (or call `reset`) for the next.
pub struct RecordNormalizer {
    rank_pattern: Regex,
    velocity_pattern: Regex,
    skips_by_reason: BTreeMap<SkipReason, usize>,
    coercion_failures: BTreeMap<String, usize>,
}

impl RecordNormalizer {
    pub fn new() -> Self {
        Self {
            // "Best Sellers Rank: #2,052 in Pet Supplies ..." -> first ordinal
            rank_pattern: Regex::new(r"#\s*([\d.,]+)").unwrap(),
            // "2K+ bought in past month", "500+ bought in past month"
            velocity_pattern: Regex::new(r"(?i)([\d.,]+)\s*([km])?\+?\s*bought").unwrap(),
            skips_by_reason: BTreeMap::new(),
            coercion_failures: BTreeMap::new(),
        }
    }

    pub fn normalize(&mut self, raw: &RawRecord) -> Result<ListingRecord, SkipReason> {
        let title = match coerce_field(raw, &["title"], coerce_string) {
            Coerced::Value(title) => title,
            _ => return Err(self.skip(SkipReason::MissingTitle)),
        };
        let category_path = match coerce_field(raw, &["category_path", "categories"], coerce_string_list) {
            Coerced::Value(path) => path,
            _ => return Err(self.skip(SkipReason::MissingCategoryPath)),
        };

        let brand = self
            .field("brand", coerce_field(raw, &["brand"], coerce_string))
            .unwrap_or_else(|| UNKNOWN_BRAND.to_string());

        let price_absolute =
            self.field("price_absolute", coerce_field(raw, &["price_absolute", "price"], coerce_number));
        let price_original = self.field(
            "price_original",
            coerce_field(raw, &["price_original", "original_price"], coerce_number),
        );
        let package_quantity = self.field(
            "package_quantity",
            coerce_field(raw, &["package_quantity", "quantity"], coerce_number),
        );
        let rating = self.field("rating", coerce_field(raw, &["rating"], coerce_rating));
        // The one zero-defaulted numeric: no reviews genuinely means zero.
        let review_count = self
            .field("review_count", coerce_field(raw, &["review_count", "reviews_count"], coerce_count))
            .unwrap_or(0);

        let rank = coerce_field(raw, &["bestseller_rank", "rank"], |v| self.coerce_rank(v));
        let bestseller_rank = self.field("bestseller_rank", rank);
        let velocity = coerce_field(raw, &["sales_velocity_30d", "sales_history"], |v| {
            self.coerce_velocity(v)
        });
        let sales_velocity_30d = self.field("sales_velocity_30d", velocity);

        let is_sponsored = self
            .field("is_sponsored", coerce_field(raw, &["is_sponsored", "sponsored"], coerce_flag))
            .unwrap_or(false);
        let has_prime = self
            .field("has_prime", coerce_field(raw, &["has_prime", "prime"], coerce_flag))
            .unwrap_or(false);

        let bullet_points = self
            .field("bullet_points", coerce_field(raw, &["bullet_points"], coerce_string_list))
            .unwrap_or_default();
        let description = self
            .field("description", coerce_field(raw, &["description"], coerce_string))
            .unwrap_or_default();
        let usage_claims = self
            .field("usage_claims", coerce_field(raw, &["usage_claims"], coerce_string_list))
            .map(dedup_case_insensitive)
            .unwrap_or_default();
        let special_ingredients = self
            .field("special_ingredients", coerce_field(raw, &["special_ingredients"], coerce_string_list))
            .map(dedup_case_insensitive)
            .unwrap_or_default();

        let asin = self.field("asin", coerce_field(raw, &["asin"], coerce_string));
        let search_term = self.field("search_term", coerce_field(raw, &["search_term"], coerce_string));
        let serp_position =
            self.field("serp_position", coerce_field(raw, &["serp_position", "position"], coerce_count));
        let scraped_at = self.field("scraped_at", coerce_timestamp(raw));

        let price_per_unit = derive_unit_price(price_absolute, package_quantity);

        Ok(ListingRecord {
            title,
            brand,
            category_path,
            price_absolute,
            price_original,
            package_quantity,
            price_per_unit,
            rating,
            review_count,
            bestseller_rank,
            sales_velocity_30d,
            is_sponsored,
            has_prime,
            bullet_points,
            description,
            usage_claims,
            special_ingredients,
            asin,
            search_term,
            serp_position,
            scraped_at,
        })
    }

    pub fn records_skipped(&self) -> usize {
        self.skips_by_reason.values().sum()
    }

    /// Skip counts keyed by reason label, ready for the run summary.
    pub fn skips_by_reason(&self) -> BTreeMap<String, usize> {
        self.skips_by_reason
            .iter()
            .map(|(reason, count)| (reason.label().to_string(), *count))
            .collect()
    }

    /// Coercion-failure counts keyed by field name.
    pub fn coercion_failures(&self) -> BTreeMap<String, usize> {
        self.coercion_failures.clone()
    }

    pub fn reset(&mut self) {
        self.skips_by_reason.clear();
        self.coercion_failures.clear();
    }

    fn skip(&mut self, reason: SkipReason) -> SkipReason {
        *self.skips_by_reason.entry(reason).or_insert(0) += 1;
        debug!(reason = reason.label(), "skipping record");
        reason
    }

    /// Unwraps a coercion result, tallying failures per field.
    fn field<T>(&mut self, field: &'static str, coerced: Coerced<T>) -> Option<T> {
        match coerced {
            Coerced::Value(value) => Some(value),
            Coerced::Absent => None,
            Coerced::Failed => {
                *self.coercion_failures.entry(field.to_string()).or_insert(0) += 1;
                debug!(field, "unreadable field value, treating as missing");
                None
            }
        }
    }

    fn coerce_rank(&self, value: &Value) -> Coerced<u32> {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Coerced::Absent;
                }
                if let Some(caps) = self.rank_pattern.captures(trimmed) {
                    return match parse_separated_u64(&caps[1]).and_then(|v| u32::try_from(v).ok()) {
                        Some(rank) => Coerced::Value(rank),
                        None => Coerced::Failed,
                    };
                }
                coerce_count(value)
            }
            _ => coerce_count(value),
        }
    }

    fn coerce_velocity(&self, value: &Value) -> Coerced<u64> {
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    return Coerced::Value(v);
                }
                match n.as_f64() {
                    Some(x) if x.is_finite() && x >= 0.0 && x.fract() == 0.0 => Coerced::Value(x as u64),
                    _ => Coerced::Failed,
                }
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Coerced::Absent;
                }
                match self.parse_velocity(trimmed) {
                    Some(v) => Coerced::Value(v),
                    None => Coerced::Failed,
                }
            }
            _ => Coerced::Failed,
        }
    }

    /// "2K+ bought in past month" -> 2000. Plain counts keep their thousands
    /// separators; a K/M suffix makes the number a decimal multiplier.
    fn parse_velocity(&self, raw: &str) -> Option<u64> {
        let caps = self.velocity_pattern.captures(raw)?;
        let number = caps.get(1)?.as_str();
        match caps.get(2) {
            Some(suffix) => {
                let base: f64 = number
                    .trim_matches(|c| c == '.' || c == ',')
                    .replace(',', ".")
                    .parse()
                    .ok()?;
                let factor = if suffix.as_str().eq_ignore_ascii_case("k") {
                    1_000.0
                } else {
                    1_000_000.0
                };
                let scaled = base * factor;
                if scaled.is_finite() && scaled >= 0.0 {
                    Some(scaled.round() as u64)
                } else {
                    None
                }
            }
            None => parse_separated_u64(number),
        }
    }
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one field coercion. `Absent` and `Failed` both leave the field
/// missing; only `Failed` counts against data quality.
enum Coerced<T> {
    Value(T),
    Absent,
    Failed,
}

fn lookup<'a>(raw: &'a RawRecord, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| raw.get(*name))
        .filter(|value| !value.is_null())
}

fn coerce_field<T>(
    raw: &RawRecord,
    names: &[&str],
    coerce: impl FnOnce(&Value) -> Coerced<T>,
) -> Coerced<T> {
    match lookup(raw, names) {
        Some(value) => coerce(value),
        None => Coerced::Absent,
    }
}

fn coerce_string(value: &Value) -> Coerced<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Coerced::Absent
            } else {
                Coerced::Value(trimmed.to_string())
            }
        }
        Value::Number(n) => Coerced::Value(n.to_string()),
        _ => Coerced::Failed,
    }
}

/// Non-negative decimal. Accepts plain numbers and European price tags:
/// "€12,99" -> 12.99, "1.299,00" -> 1299.0 (dots are thousands separators).
fn coerce_number(value: &Value) -> Coerced<f64> {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(x) if x.is_finite() && x >= 0.0 => Coerced::Value(x),
            _ => Coerced::Failed,
        },
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Coerced::Absent;
            }
            if let Ok(x) = trimmed.parse::<f64>() {
                return if x.is_finite() && x >= 0.0 {
                    Coerced::Value(x)
                } else {
                    Coerced::Failed
                };
            }
            let cleaned: String = trimmed
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
                .collect();
            match cleaned.replace('.', "").replace(',', ".").parse::<f64>() {
                Ok(x) if x.is_finite() && x >= 0.0 => Coerced::Value(x),
                _ => Coerced::Failed,
            }
        }
        _ => Coerced::Failed,
    }
}

/// Star rating in [0, 5]. Text forms like "4.5 out of 5 stars" keep only the
/// leading number; out-of-range values fail rather than clamp.
fn coerce_rating(value: &Value) -> Coerced<f64> {
    let candidate = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Coerced::Absent;
            }
            let lead = trimmed.split_whitespace().next().unwrap_or("");
            lead.parse::<f64>()
                .ok()
                .or_else(|| lead.replace(',', ".").parse::<f64>().ok())
        }
        _ => None,
    };
    match candidate {
        Some(x) if (0.0..=5.0).contains(&x) => Coerced::Value(x),
        _ => Coerced::Failed,
    }
}

fn coerce_count(value: &Value) -> Coerced<u32> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return match u32::try_from(v) {
                    Ok(count) => Coerced::Value(count),
                    Err(_) => Coerced::Failed,
                };
            }
            // pandas exports integer columns as floats once the column has gaps
            match n.as_f64() {
                Some(x) if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x <= u32::MAX as f64 => {
                    Coerced::Value(x as u32)
                }
                _ => Coerced::Failed,
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Coerced::Absent;
            }
            match parse_separated_u64(trimmed).and_then(|v| u32::try_from(v).ok()) {
                Some(count) => Coerced::Value(count),
                None => Coerced::Failed,
            }
        }
        _ => Coerced::Failed,
    }
}

fn coerce_flag(value: &Value) -> Coerced<bool> {
    match value {
        Value::Bool(b) => Coerced::Value(*b),
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 0.0 => Coerced::Value(false),
            Some(x) if x == 1.0 => Coerced::Value(true),
            _ => Coerced::Failed,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Coerced::Absent,
            "true" | "1" | "yes" => Coerced::Value(true),
            "false" | "0" | "no" => Coerced::Value(false),
            _ => Coerced::Failed,
        },
        _ => Coerced::Failed,
    }
}

/// List fields arrive as JSON arrays or as `|`-joined strings (the upstream
/// CSV export). Blank entries drop out; an empty result counts as absent.
fn coerce_string_list(value: &Value) -> Coerced<Vec<String>> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match coerce_string(item) {
                    Coerced::Value(s) => out.push(s),
                    Coerced::Absent => {}
                    Coerced::Failed => return Coerced::Failed,
                }
            }
            if out.is_empty() {
                Coerced::Absent
            } else {
                Coerced::Value(out)
            }
        }
        Value::String(s) => {
            let parts: Vec<String> = s
                .split('|')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect();
            if parts.is_empty() {
                Coerced::Absent
            } else {
                Coerced::Value(parts)
            }
        }
        _ => Coerced::Failed,
    }
}

/// "2,052" and "2.052" both mean 2052 in scraped counts. Separator groups
/// after the first must have exactly three digits, so "4.5" fails instead of
/// reading as 45.
fn parse_separated_u64(raw: &str) -> Option<u64> {
    let raw = raw.trim_matches(|c| c == '.' || c == ',');
    if raw.is_empty() {
        return None;
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok();
    }
    let groups: Vec<&str> = raw.split([',', '.']).collect();
    let first_ok = !groups[0].is_empty()
        && groups[0].len() <= 3
        && groups[0].chars().all(|c| c.is_ascii_digit());
    let rest_ok = groups[1..]
        .iter()
        .all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()));
    if groups.len() >= 2 && first_ok && rest_ok {
        groups.concat().parse().ok()
    } else {
        None
    }
}

fn dedup_case_insensitive(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.to_lowercase()))
        .collect()
}

/// `scraped_at` as RFC 3339, or the upstream scraper's split `scrape_date` +
/// `scrape_time` columns.
fn coerce_timestamp(raw: &RawRecord) -> Coerced<DateTime<Utc>> {
    if let Some(value) = lookup(raw, &["scraped_at"]) {
        return match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Coerced::Absent;
                }
                match DateTime::parse_from_rfc3339(trimmed) {
                    Ok(dt) => Coerced::Value(dt.with_timezone(&Utc)),
                    Err(_) => Coerced::Failed,
                }
            }
            _ => Coerced::Failed,
        };
    }

    let date = lookup(raw, &["scrape_date"]).and_then(Value::as_str);
    let time = lookup(raw, &["scrape_time"]).and_then(Value::as_str);
    match (date, time) {
        (Some(date), Some(time)) => {
            let joined = format!("{} {}", date.trim(), time.trim());
            match NaiveDateTime::parse_from_str(&joined, "%Y-%m-%d %H:%M:%S") {
                Ok(naive) => Coerced::Value(naive.and_utc()),
                Err(_) => Coerced::Failed,
            }
        }
        (Some(date), None) => match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
            Ok(d) => Coerced::Value(d.and_time(NaiveTime::MIN).and_utc()),
            Err(_) => Coerced::Failed,
        },
        _ => Coerced::Absent,
    }
}
