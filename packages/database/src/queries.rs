//! Query functions projecting the history, trees, and flags tables.
//!
//! Old/new tree versions live as JSON blobs on each history row; JSON
//! operators expand them into flat columns here. Timestamps are text-cast
//! with `to_char` and coordinates `float8`-cast so row conversion on the
//! Rust side stays explicit and lossless.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::Database;

use crate::DbError;

/// One row of the change history, old and new tree versions expanded.
#[derive(Debug, Clone, Default)]
pub struct HistoryRow {
    pub change_id: i64,
    pub change_at: Option<String>,
    pub change_op: String,

    pub old_key: Option<String>,
    pub old_kind: Option<String>,
    pub old_desc: Option<String>,
    pub old_img: Option<String>,
    pub old_by: Option<String>,
    pub old_at: Option<String>,
    pub old_lat: Option<f64>,
    pub old_lon: Option<f64>,

    pub new_key: Option<String>,
    pub new_kind: Option<String>,
    pub new_desc: Option<String>,
    pub new_img: Option<String>,
    pub new_by: Option<String>,
    pub new_at: Option<String>,
    pub new_lat: Option<f64>,
    pub new_lon: Option<f64>,
}

/// One row of the current trees table.
#[derive(Debug, Clone, Default)]
pub struct TreeRow {
    pub key: Option<String>,
    pub kind: Option<String>,
    pub descr: Option<String>,
    pub img: Option<String>,
    pub added_by: Option<String>,
    pub added_at: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// One row of the flags table.
#[derive(Debug, Clone, Default)]
pub struct FlagRow {
    pub flagged_by: Option<String>,
    pub flagged_at: Option<String>,
    pub tree_key: Option<String>,
    pub flag: Option<String>,
    pub reason: Option<String>,
}

/// Fetches change history rows, oldest first. `since_days > 0` restricts
/// the window by change timestamp; `0` fetches everything.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row is missing its id or
/// operation.
pub async fn history_rows(db: &dyn Database, since_days: u32) -> Result<Vec<HistoryRow>, DbError> {
    let mut sql = String::from(
        "SELECT id::bigint AS change_id
              , to_char(at, 'YYYY-MM-DD HH24:MI:SS') AS change_at
              , op AS change_op
              , old_json->>'ssm_key' AS old_key
              , old_json->>'type' AS old_kind
              , old_json->>'description' AS old_desc
              , old_json->>'img' AS old_img
              , old_json->>'added_by' AS old_by
              , to_char((old_json->>'added_at')::timestamp, 'YYYY-MM-DD HH24:MI:SS') AS old_at
              , (old_json#>>'{point,coordinates,1}')::float8 AS old_lat
              , (old_json#>>'{point,coordinates,0}')::float8 AS old_lon
              , new_json->>'ssm_key' AS new_key
              , new_json->>'type' AS new_kind
              , new_json->>'description' AS new_desc
              , new_json->>'img' AS new_img
              , new_json->>'added_by' AS new_by
              , to_char((new_json->>'added_at')::timestamp, 'YYYY-MM-DD HH24:MI:SS') AS new_at
              , (new_json#>>'{point,coordinates,1}')::float8 AS new_lat
              , (new_json#>>'{point,coordinates,0}')::float8 AS new_lon
           FROM history",
    );
    if since_days > 0 {
        let _ = write!(
            sql,
            " WHERE at > (CURRENT_DATE - INTERVAL '{since_days} days')"
        );
    }
    sql.push_str(" ORDER BY id");

    let rows = db.query_raw_params(&sql, &[]).await?;

    rows.iter()
        .map(|row| {
            Ok(HistoryRow {
                change_id: row.to_value("change_id").map_err(|e| DbError::Conversion {
                    message: format!("Failed to parse change id: {e}"),
                })?,
                change_at: row.to_value("change_at").unwrap_or(None),
                change_op: row.to_value("change_op").map_err(|e| DbError::Conversion {
                    message: format!("Failed to parse change op: {e}"),
                })?,
                old_key: row.to_value("old_key").unwrap_or(None),
                old_kind: row.to_value("old_kind").unwrap_or(None),
                old_desc: row.to_value("old_desc").unwrap_or(None),
                old_img: row.to_value("old_img").unwrap_or(None),
                old_by: row.to_value("old_by").unwrap_or(None),
                old_at: row.to_value("old_at").unwrap_or(None),
                old_lat: row.to_value("old_lat").unwrap_or(None),
                old_lon: row.to_value("old_lon").unwrap_or(None),
                new_key: row.to_value("new_key").unwrap_or(None),
                new_kind: row.to_value("new_kind").unwrap_or(None),
                new_desc: row.to_value("new_desc").unwrap_or(None),
                new_img: row.to_value("new_img").unwrap_or(None),
                new_by: row.to_value("new_by").unwrap_or(None),
                new_at: row.to_value("new_at").unwrap_or(None),
                new_lat: row.to_value("new_lat").unwrap_or(None),
                new_lon: row.to_value("new_lon").unwrap_or(None),
            })
        })
        .collect()
}

/// Fetches the current trees table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn tree_rows(db: &dyn Database) -> Result<Vec<TreeRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT ssm_key AS key
                  , type AS kind
                  , description AS descr
                  , img
                  , added_by
                  , to_char(added_at, 'YYYY-MM-DD HH24:MI:SS') AS added_at
                  , ST_Y(point)::float8 AS lat
                  , ST_X(point)::float8 AS lon
               FROM trees",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| TreeRow {
            key: row.to_value("key").unwrap_or(None),
            kind: row.to_value("kind").unwrap_or(None),
            descr: row.to_value("descr").unwrap_or(None),
            img: row.to_value("img").unwrap_or(None),
            added_by: row.to_value("added_by").unwrap_or(None),
            added_at: row.to_value("added_at").unwrap_or(None),
            lat: row.to_value("lat").unwrap_or(None),
            lon: row.to_value("lon").unwrap_or(None),
        })
        .collect())
}

/// Fetches the flags table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn flag_rows(db: &dyn Database) -> Result<Vec<FlagRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT flagged_by
                  , to_char(flagged_at, 'YYYY-MM-DD HH24:MI:SS') AS flagged_at
                  , tree AS tree_key
                  , flag
                  , reason
               FROM flags",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| FlagRow {
            flagged_by: row.to_value("flagged_by").unwrap_or(None),
            flagged_at: row.to_value("flagged_at").unwrap_or(None),
            tree_key: row.to_value("tree_key").unwrap_or(None),
            flag: row.to_value("flag").unwrap_or(None),
            reason: row.to_value("reason").unwrap_or(None),
        })
        .collect())
}
