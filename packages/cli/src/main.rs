#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report generator for the fruit map edit history.
//!
//! One batch run: fetch history, trees, and flags from the database,
//! enrich them with reverse-geocoded addresses through the persistent
//! cache, and render the static HTML report. Lookups are strictly
//! sequential and rate-limited; concurrent runs against the same cache
//! file must be serialized by the operator.

use std::path::PathBuf;

use clap::Parser;
use fruit_map_cli_utils::IndicatifProgress;
use fruit_map_database::queries;
use fruit_map_geo::{NominatimClient, ReverseCache};
use fruit_map_history::{History, util};
use fruit_map_report::Report;
use fruit_map_trees::{Flags, Trees};

/// Generate a static HTML report from the fruit map's edit history.
#[derive(Parser)]
#[command(name = "fruit-map", version, about)]
struct Args {
    /// How many days of history to include (0 = everything).
    #[arg(long, value_name = "DAYS", default_value_t = 90)]
    since: u32,

    /// Output directory for the generated report.
    #[arg(long, value_name = "DIR", default_value = "dist")]
    out: PathBuf,

    /// Path of the persistent reverse-geocode cache file.
    #[arg(long, value_name = "FILE", default_value = "reversecache")]
    reverse_cache: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = fruit_map_cli_utils::init_logger();
    let args = Args::parse();

    // Fail before any rate-limited lookups if the output directory cannot
    // exist.
    std::fs::create_dir_all(&args.out)?;

    let db = fruit_map_database::db::connect_from_env().await?;

    let mut history = History::from_rows(queries::history_rows(&*db, args.since).await?);
    log::info!(
        "history entries during past {} days: {}",
        args.since,
        history.count()
    );

    let mut trees = Trees::from_rows(queries::tree_rows(&*db).await?);
    log::info!("tree table has {} entries", trees.count());
    let flag_rows = queries::flag_rows(&*db).await?;

    let mut cache = ReverseCache::new(Box::new(NominatimClient::new()?));
    cache.load(&args.reverse_cache)?;

    let bar = IndicatifProgress::records_bar(&multi, "Enriching history");
    history.enrich(&mut cache, bar).await;

    let bar = IndicatifProgress::records_bar(&multi, "Resolving tree addresses");
    trees.enrich(&mut cache, bar).await;

    // Join after enrichment so flag entries carry resolved addresses.
    let flags = Flags::from_rows(flag_rows, &trees);

    if let Err(err) = cache.save(&args.reverse_cache) {
        log::warn!("saving reverse cache failed: {err}");
    }

    let report = Report {
        history: &history,
        flags: &flags,
        since_days: args.since,
        generated_at: util::format_date(chrono::Local::now().naive_local()),
    };
    report.write(&args.out)?;
    log::info!("report written to {}", args.out.join("index.html").display());

    Ok(())
}
