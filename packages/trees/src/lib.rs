#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Current tree table snapshot and flagged-tree records.
//!
//! The flag report joins each flag to its tree, so the snapshot is loaded
//! first, enriched with addresses through the shared reverse cache, and
//! then copied into the flag entries.

pub mod flags;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use fruit_map_database::queries::TreeRow;
use fruit_map_geo::{Position, ReverseCache};
use fruit_map_history::progress::ProgressCallback;
use fruit_map_history::util;

pub use flags::{FlagEntry, Flags};

/// One row of the current tree table.
#[derive(Debug, Clone, Default)]
pub struct TreeEntry {
    pub key: String,
    pub kind: Option<String>,
    pub desc: Option<String>,
    pub img: Option<String>,
    pub by: Option<String>,
    pub at: Option<NaiveDateTime>,
    pub pos: Option<Position>,
    /// Formatted address, empty until enrichment.
    pub address: String,
}

/// The current tree table, keyed by tree key.
#[derive(Debug, Default)]
pub struct Trees {
    entries: BTreeMap<String, TreeEntry>,
}

impl Trees {
    /// Builds the snapshot from raw rows. Rows without a key are logged
    /// and skipped; duplicate keys keep the last row.
    #[must_use]
    pub fn from_rows(rows: Vec<TreeRow>) -> Self {
        let mut entries = BTreeMap::new();

        for row in rows {
            let Some(key) = row.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
            else {
                log::warn!("tree row without a key, skipping");
                continue;
            };

            entries.insert(
                key.to_string(),
                TreeEntry {
                    key: key.to_string(),
                    kind: row.kind.map(|s| s.trim().to_string()),
                    desc: row.descr.map(|s| s.trim().to_string()),
                    img: row.img,
                    by: row.added_by,
                    at: row.added_at.as_deref().and_then(util::parse_db_timestamp),
                    pos: match (row.lat, row.lon) {
                        (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
                        _ => None,
                    },
                    address: String::new(),
                },
            );
        }

        Self { entries }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TreeEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Resolves an address for every positioned tree through the shared
    /// cache. Only cache misses cost a rate-limited network lookup.
    pub async fn enrich(&mut self, cache: &mut ReverseCache, progress: Arc<dyn ProgressCallback>) {
        progress.set_total(self.entries.len() as u64);

        for (key, entry) in &mut self.entries {
            if let Some(pos) = entry.pos {
                if !cache.has(pos) {
                    log::info!("looking up address for tree {key}");
                    cache.add(pos).await;
                }
                entry.address = cache.format_address(pos);
            }
            progress.inc(1);
        }

        progress.finish(format!("Resolved addresses for {} trees", self.entries.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str) -> TreeRow {
        TreeRow {
            key: Some(key.to_string()),
            kind: Some("Körsbär".to_string()),
            lat: Some(55.7),
            lon: Some(13.2),
            ..TreeRow::default()
        }
    }

    #[test]
    fn snapshot_is_keyed_and_trimmed() {
        let trees = Trees::from_rows(vec![row("abc  "), row("def")]);
        assert_eq!(trees.count(), 2);
        assert_eq!(trees.get("abc").unwrap().key, "abc");
        assert!(trees.get("abc  ").is_none());
    }

    #[test]
    fn keyless_rows_are_skipped() {
        let mut keyless = row("x");
        keyless.key = None;
        let trees = Trees::from_rows(vec![keyless, row("y")]);
        assert_eq!(trees.count(), 1);
    }
}
