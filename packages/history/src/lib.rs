#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Edit-history pipeline for the fruit map.
//!
//! Turns raw history rows into typed [`Entry`] values and enriches them
//! for the report: reverse-geocoded addresses for the old and new
//! positions, an HTML diff of description changes, and a marker for
//! updates that changed nothing.

pub mod diff;
pub mod progress;
pub mod util;

use std::sync::Arc;

use chrono::NaiveDateTime;
use fruit_map_database::queries::HistoryRow;
use fruit_map_geo::{Position, ReverseCache};

use crate::progress::ProgressCallback;

/// Change operations recorded in the history table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One version of a tree as embedded in a change record.
///
/// Key, kind, and description arrive space-padded from the legacy schema
/// and are trimmed on construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeVersion {
    pub key: Option<String>,
    pub kind: Option<String>,
    pub desc: Option<String>,
    pub img: Option<String>,
    pub by: Option<String>,
    pub at: Option<NaiveDateTime>,
    pub pos: Option<Position>,
}

impl TreeVersion {
    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        key: Option<String>,
        kind: Option<String>,
        desc: Option<String>,
        img: Option<String>,
        by: Option<String>,
        at: Option<String>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Self {
        let trimmed = |s: Option<String>| s.map(|s| s.trim().to_string());
        Self {
            key: trimmed(key),
            kind: trimmed(kind),
            desc: trimmed(desc),
            img,
            by,
            at: at.as_deref().and_then(util::parse_db_timestamp),
            pos: match (lat, lon) {
                (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
                _ => None,
            },
        }
    }

    /// True when this version describes the same tree content as `other`:
    /// kind, description, image, and position all equal. Author and
    /// timestamps are not content.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.desc == other.desc
            && self.img == other.img
            && self.pos == other.pos
    }
}

/// One enriched change record.
#[derive(Debug, Clone)]
pub struct Entry {
    pub change_id: i64,
    pub change_at: Option<NaiveDateTime>,
    pub op: ChangeOp,

    pub old: TreeVersion,
    pub new: TreeVersion,

    /// Formatted address of the old position, empty until enrichment.
    pub old_address: String,
    /// Formatted address of the new position, empty until enrichment.
    pub new_address: String,
    /// HTML diff of the descriptions, set for UPDATE entries.
    pub desc_diff: String,
    /// An UPDATE that changed no tree content.
    pub update_is_empty: bool,
}

/// Counts per change operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub inserts: u32,
    pub updates: u32,
    pub deletes: u32,
}

impl Stats {
    /// Net tree count over the window, with an explicit sign for gains.
    #[must_use]
    pub fn net(&self) -> String {
        let net = i64::from(self.inserts) - i64::from(self.deletes);
        if net > 0 {
            format!("+{net}")
        } else {
            net.to_string()
        }
    }
}

/// The change history over a reporting window, newest change first.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<Entry>,
    pub stats: Stats,
}

impl History {
    /// Builds the history from raw rows. Rows with an unknown operation
    /// are logged and skipped.
    #[must_use]
    pub fn from_rows(rows: Vec<HistoryRow>) -> Self {
        let mut entries: Vec<Entry> = Vec::with_capacity(rows.len());
        let mut stats = Stats::default();

        for row in rows {
            let Ok(op) = row.change_op.parse::<ChangeOp>() else {
                log::warn!(
                    "history row {}: unknown op {:?}, skipping",
                    row.change_id,
                    row.change_op
                );
                continue;
            };

            match op {
                ChangeOp::Insert => stats.inserts += 1,
                ChangeOp::Update => stats.updates += 1,
                ChangeOp::Delete => stats.deletes += 1,
            }

            entries.push(Entry {
                change_id: row.change_id,
                change_at: row.change_at.as_deref().and_then(util::parse_db_timestamp),
                op,
                old: TreeVersion::from_parts(
                    row.old_key,
                    row.old_kind,
                    row.old_desc,
                    row.old_img,
                    row.old_by,
                    row.old_at,
                    row.old_lat,
                    row.old_lon,
                ),
                new: TreeVersion::from_parts(
                    row.new_key,
                    row.new_kind,
                    row.new_desc,
                    row.new_img,
                    row.new_by,
                    row.new_at,
                    row.new_lat,
                    row.new_lon,
                ),
                old_address: String::new(),
                new_address: String::new(),
                desc_diff: String::new(),
                update_is_empty: false,
            });
        }

        entries.sort_by(|a, b| b.change_id.cmp(&a.change_id));

        Self { entries, stats }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Enriches every entry: resolves addresses for the old and then the
    /// new position, diffs UPDATE descriptions, and flags empty updates.
    ///
    /// Each cache miss costs one rate-limited network lookup; everything
    /// else is served from the cache.
    pub async fn enrich(&mut self, cache: &mut ReverseCache, progress: Arc<dyn ProgressCallback>) {
        progress.set_total(self.entries.len() as u64);

        for entry in &mut self.entries {
            if let Some(pos) = entry.old.pos {
                if !cache.has(pos) {
                    log::info!("looking up address for change {}", entry.change_id);
                    cache.add(pos).await;
                }
                entry.old_address = cache.format_address(pos);
            }
            if let Some(pos) = entry.new.pos {
                if !cache.has(pos) {
                    log::info!("looking up address for change {}", entry.change_id);
                    cache.add(pos).await;
                }
                entry.new_address = cache.format_address(pos);
            }

            if entry.op == ChangeOp::Update {
                entry.desc_diff = diff::html_diff(
                    entry.old.desc.as_deref().unwrap_or(""),
                    entry.new.desc.as_deref().unwrap_or(""),
                );
                entry.update_is_empty = entry.old.same_content(&entry.new);
            }

            progress.inc(1);
        }

        progress.finish(format!("Enriched {} history entries", self.entries.len()));
    }
}
