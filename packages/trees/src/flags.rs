//! Flagged-tree records joined to the tree snapshot.

use chrono::NaiveDateTime;
use fruit_map_database::queries::FlagRow;
use fruit_map_history::util;

use crate::{TreeEntry, Trees};

/// One flag raised against a tree.
#[derive(Debug, Clone)]
pub struct FlagEntry {
    pub by: Option<String>,
    pub at: Option<NaiveDateTime>,
    pub key: String,
    pub flag: Option<String>,
    pub reason: Option<String>,
    /// The flagged tree, if it still exists in the tree table.
    pub tree: Option<TreeEntry>,
}

/// All flags, newest first.
#[derive(Debug, Default)]
pub struct Flags {
    entries: Vec<FlagEntry>,
}

impl Flags {
    /// Joins flag rows to their trees. A flag whose tree is gone is kept
    /// and logged; the report still shows the flag itself.
    #[must_use]
    pub fn from_rows(rows: Vec<FlagRow>, trees: &Trees) -> Self {
        let mut entries: Vec<FlagEntry> = rows
            .into_iter()
            .map(|row| {
                let key = row
                    .tree_key
                    .as_deref()
                    .map_or(String::new(), |k| k.trim().to_string());

                let tree = trees.get(&key).cloned();
                if tree.is_none() {
                    log::info!("flagged tree {key} not found in tree table");
                }

                FlagEntry {
                    by: row.flagged_by,
                    at: row.flagged_at.as_deref().and_then(util::parse_db_timestamp),
                    key,
                    flag: row.flag.map(|s| s.trim().to_string()),
                    reason: row.reason.map(|s| s.trim().to_string()),
                    tree,
                }
            })
            .collect();

        entries.sort_by(|a, b| b.at.cmp(&a.at));

        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[FlagEntry] {
        &self.entries
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use fruit_map_database::queries::TreeRow;

    use super::*;

    fn flag_row(key: &str, at: &str) -> FlagRow {
        FlagRow {
            flagged_by: Some("anna".to_string()),
            flagged_at: Some(at.to_string()),
            tree_key: Some(key.to_string()),
            flag: Some("gone".to_string()),
            reason: Some("trädet är borta".to_string()),
        }
    }

    #[test]
    fn flags_join_their_trees_newest_first() {
        let trees = Trees::from_rows(vec![TreeRow {
            key: Some("abc".to_string()),
            ..TreeRow::default()
        }]);

        let flags = Flags::from_rows(
            vec![
                flag_row("abc", "2026-01-01 08:00:00"),
                flag_row("abc", "2026-03-01 08:00:00"),
            ],
            &trees,
        );

        assert_eq!(flags.count(), 2);
        assert!(flags.entries()[0].at > flags.entries()[1].at);
        assert!(flags.entries()[0].tree.is_some());
    }

    #[test]
    fn missing_tree_keeps_the_flag() {
        let trees = Trees::from_rows(vec![]);
        let flags = Flags::from_rows(vec![flag_row("ghost", "2026-01-01 08:00:00")], &trees);

        assert_eq!(flags.count(), 1);
        assert!(flags.entries()[0].tree.is_none());
        assert_eq!(flags.entries()[0].key, "ghost");
    }
}
