//! Key-driven SECRET/PLAIN classification

use super::parser::RawPair;
use super::{Classification, EnvBuckets, EnvEntry};

/// Key substrings that mark a value as secret
pub const SECRET_MARKERS: &[&str] = &[
    "API_KEY",
    "TOKEN",
    "SECRET",
    "PASSWORD",
    "PRIVATE_KEY",
    "CREDENTIAL",
    "AUTH_KEY",
];

/// Classifies a key by case-insensitive substring match; values are never inspected
pub fn classify(key: &str) -> Classification {
    let upper = key.to_uppercase();
    if SECRET_MARKERS.iter().any(|marker| upper.contains(marker)) {
        Classification::Secret
    } else {
        Classification::Plain
    }
}

/// Splits pairs into disjoint buckets, preserving input order within each
pub fn split(pairs: Vec<RawPair>) -> EnvBuckets {
    let mut buckets = EnvBuckets::default();
    for pair in pairs {
        let classification = classify(&pair.key);
        let entry = EnvEntry {
            key: pair.key,
            value: pair.value,
            classification,
        };
        match classification {
            Classification::Secret => buckets.secrets.push(entry),
            Classification::Plain => buckets.plain.push(entry),
        }
    }
    buckets
}
