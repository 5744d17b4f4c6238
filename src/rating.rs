//! Local leaderboards.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

use crate::difficulty::Difficulty;
use crate::level::LevelId;

pub const MAX_ENTRIES: usize = 20;
/// Bucket used by the flat scheme and for legacy flat lists.
pub const OVERALL_BUCKET: &str = "overall";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    pub name: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub penalty: u32,
    /// Whole seconds the session took.
    #[serde(default)]
    pub duration: u64,
    /// Entries saved without a date read as the Unix epoch.
    #[serde(alias = "timestamp", default)]
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LevelId>,
}

/// Higher score first; equal scores rank the smaller penalty first.
pub fn rank(a: &RatingEntry, b: &RatingEntry) -> Ordering {
    b.score.cmp(&a.score).then(a.penalty.cmp(&b.penalty))
}

/// How finished sessions are filed into buckets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RatingScheme {
    /// One list for everything.
    Flat,
    #[default]
    PerDifficulty,
    /// One list per level, fed by each cleared level's own score.
    PerLevel,
}

impl RatingScheme {
    /// Bucket keys this scheme displays, in order.
    pub fn buckets(self) -> Vec<String> {
        match self {
            RatingScheme::Flat => vec![OVERALL_BUCKET.to_string()],
            RatingScheme::PerDifficulty => {
                Difficulty::ALL.iter().map(|d| d.to_string()).collect()
            }
            RatingScheme::PerLevel => LevelId::ORDER.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// The whole rating record: bucket key to ranked list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingBook {
    buckets: BTreeMap<String, Vec<RatingEntry>>,
}

impl RatingBook {
    /// Read either stored shape: a flat list (filed under `overall`) or a
    /// map of bucket lists. Unparseable entries are dropped with a warning.
    pub fn from_value(value: Value) -> Self {
        let mut book = RatingBook::default();
        match value {
            Value::Array(items) => {
                book.buckets
                    .insert(OVERALL_BUCKET.to_string(), parse_entries(OVERALL_BUCKET, items));
            }
            Value::Object(map) => {
                for (key, list) in map {
                    match list {
                        Value::Array(items) => {
                            let entries = parse_entries(&key, items);
                            book.buckets.insert(key, entries);
                        }
                        Value::Null => {}
                        other => warn!(bucket = %key, kind = ?other, "ignoring malformed rating bucket"),
                    }
                }
            }
            Value::Null => {}
            other => warn!(kind = ?other, "rating record has unexpected shape, starting empty"),
        }
        book.normalize();
        book
    }

    pub fn bucket(&self, key: &str) -> &[RatingEntry] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Buckets to show for `scheme`. Entries still sitting in `overall`
    /// (a legacy flat list) get their own column under any other scheme.
    pub fn shown_buckets(&self, scheme: RatingScheme) -> Vec<String> {
        let mut keys = scheme.buckets();
        if !self.bucket(OVERALL_BUCKET).is_empty() && !keys.iter().any(|k| k == OVERALL_BUCKET) {
            keys.push(OVERALL_BUCKET.to_string());
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Insert keeping the bucket ranked and capped. Returns the 1-based
    /// place the entry landed on, or `None` if it fell off the board.
    pub fn push(&mut self, key: &str, entry: RatingEntry) -> Option<usize> {
        let bucket = self.buckets.entry(key.to_string()).or_default();
        bucket.push(entry.clone());
        bucket.sort_by(rank);
        bucket.truncate(MAX_ENTRIES);
        bucket.iter().position(|e| *e == entry).map(|i| i + 1)
    }

    fn normalize(&mut self) {
        for bucket in self.buckets.values_mut() {
            let ranked: Vec<RatingEntry> = bucket.drain(..).sorted_by(rank).take(MAX_ENTRIES).collect();
            *bucket = ranked;
        }
    }
}

fn parse_entries(bucket: &str, items: Vec<Value>) -> Vec<RatingEntry> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RatingEntry>(item) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(bucket, error = %err, "dropping unreadable rating entry");
                None
            }
        })
        .collect()
}
