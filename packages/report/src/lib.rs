#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Static HTML output for the edit-history report.
//!
//! Pages are plain built strings: `index.html` with the enriched change
//! history, `flags.html` with flagged trees, and one small wrapper page
//! per photographed change so the report can link full-size photos
//! without embedding them.

use std::fmt::Write as _;
use std::path::Path;

use fruit_map_history::{ChangeOp, Entry, History, TreeVersion, util};
use fruit_map_trees::Flags;
use thiserror::Error;

/// Base URL of the hosted tree photos.
pub const IMAGE_URL_BASE: &str = "https://fruktkartan-thumbs.s3.eu-north-1.amazonaws.com";

/// Errors from report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Creating the output directory or writing a page failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Hosted photo URL for a database image name.
#[must_use]
pub fn image_url(name: &str) -> String {
    format!("{IMAGE_URL_BASE}/{name}_1200.jpg")
}

/// File name of the wrapper page for a database image name.
#[must_use]
pub fn image_page_name(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    format!("img_{stem}.html")
}

/// Escapes text for HTML element and attribute positions.
#[must_use]
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One report-generation run over enriched data.
pub struct Report<'a> {
    pub history: &'a History,
    pub flags: &'a Flags,
    /// Reporting window in days; 0 means everything.
    pub since_days: u32,
    /// Pre-formatted generation date shown in the page footer.
    pub generated_at: String,
}

impl Report<'_> {
    /// Renders `index.html`, `flags.html`, and the image wrapper pages
    /// under `out_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the directory or one of the two main
    /// pages cannot be written. A failed image wrapper page is logged and
    /// skipped.
    pub fn write(&self, out_dir: &Path) -> Result<(), ReportError> {
        ensure_dir(out_dir)?;

        std::fs::write(out_dir.join("index.html"), self.render_index())?;
        std::fs::write(out_dir.join("flags.html"), self.render_flags())?;
        self.write_image_pages(out_dir);

        Ok(())
    }

    fn render_index(&self) -> String {
        let mut page = page_head("Fruktkartan — ändringshistorik");

        let stats = &self.history.stats;
        if self.since_days > 0 {
            let _ = write!(
                page,
                "<h1>Ändringar de senaste {} dagarna</h1>\n",
                self.since_days
            );
        } else {
            page.push_str("<h1>Alla ändringar</h1>\n");
        }
        let _ = write!(
            page,
            "<p class=\"stats\">{} ändringar: {} nya, {} ändrade, {} borttagna (netto {}).\n\
             Genererad {}.</p>\n",
            self.history.count(),
            stats.inserts,
            stats.updates,
            stats.deletes,
            stats.net(),
            escape_html(&self.generated_at),
        );
        let _ = write!(
            page,
            "<p><a href=\"flags.html\">Flaggade träd ({})</a></p>\n",
            self.flags.count()
        );

        for entry in self.history.entries() {
            render_entry(&mut page, entry);
        }

        page.push_str("</body>\n</html>\n");
        page
    }

    fn render_flags(&self) -> String {
        let mut page = page_head("Fruktkartan — flaggade träd");

        let _ = write!(page, "<h1>Flaggade träd ({})</h1>\n", self.flags.count());
        page.push_str("<p><a href=\"index.html\">Tillbaka till historiken</a></p>\n");

        for flag in self.flags.entries() {
            page.push_str("<section class=\"flag\">\n");
            let _ = write!(
                page,
                "<h2>{} <span class=\"key\">{}</span></h2>\n",
                escape_html(flag.flag.as_deref().unwrap_or("?")),
                escape_html(&flag.key),
            );
            if let Some(reason) = flag.reason.as_deref().filter(|r| !r.is_empty()) {
                let _ = write!(page, "<p class=\"reason\">{}</p>\n", escape_html(reason));
            }
            let _ = write!(
                page,
                "<p class=\"meta\">Flaggat av {} {}</p>\n",
                escape_html(flag.by.as_deref().unwrap_or("okänd")),
                flag.at.map(util::format_datetime).unwrap_or_default(),
            );

            if let Some(tree) = &flag.tree {
                page.push_str("<div class=\"tree\">\n");
                field_row(&mut page, "Sort", tree.kind.as_deref().unwrap_or(""));
                field_row(&mut page, "Beskrivning", tree.desc.as_deref().unwrap_or(""));
                if let Some(pos) = tree.pos {
                    address_row(&mut page, &tree.address, pos);
                }
                if let Some(img) = tree.img.as_deref().filter(|i| !i.is_empty()) {
                    let _ = write!(
                        page,
                        "<p><a href=\"{}\">foto</a></p>\n",
                        escape_html(&image_url(img))
                    );
                }
                page.push_str("</div>\n");
            } else {
                page.push_str("<p class=\"missing\">Trädet finns inte längre i databasen.</p>\n");
            }

            page.push_str("</section>\n");
        }

        page.push_str("</body>\n</html>\n");
        page
    }

    /// Writes one wrapper page per photographed history entry. Failures
    /// are logged and skipped; the report is still usable without them.
    fn write_image_pages(&self, out_dir: &Path) {
        for entry in self.history.entries() {
            for img in [entry.old.img.as_deref(), entry.new.img.as_deref()]
                .into_iter()
                .flatten()
                .filter(|img| !img.is_empty())
            {
                let path = out_dir.join(image_page_name(img));
                if path.exists() {
                    continue;
                }
                if let Err(err) = std::fs::write(&path, render_image_page(img)) {
                    log::warn!("writing {} failed: {err}", path.display());
                }
            }
        }
    }
}

fn page_head(title: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"sv\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>\n\
         body {{ font-family: sans-serif; max-width: 60em; margin: 0 auto; padding: 0 1em; }}\n\
         section {{ border-top: 1px solid #ccc; padding: 0.5em 0; }}\n\
         .key {{ color: #888; font-size: 80%; }}\n\
         .empty-update {{ color: #888; font-style: italic; }}\n\
         .meta {{ color: #555; }}\n\
         del {{ text-decoration: none; }}\n\
         ins {{ text-decoration: none; }}\n\
         </style>\n</head>\n<body>\n",
        escape_html(title)
    )
}

/// Swedish operation label for an entry heading.
const fn op_label(op: ChangeOp) -> &'static str {
    match op {
        ChangeOp::Insert => "Nytt träd",
        ChangeOp::Update => "Ändrat träd",
        ChangeOp::Delete => "Borttaget träd",
    }
}

fn render_entry(page: &mut String, entry: &Entry) {
    let _ = write!(
        page,
        "<section class=\"entry op-{}\">\n<h2>{} <span class=\"key\">#{}</span> {}</h2>\n",
        entry.op.to_string().to_lowercase(),
        op_label(entry.op),
        entry.change_id,
        entry.change_at.map(util::format_datetime).unwrap_or_default(),
    );

    match entry.op {
        ChangeOp::Insert => version_block(page, &entry.new, &entry.new_address, "Nytt"),
        ChangeOp::Delete => version_block(page, &entry.old, &entry.old_address, "Borttaget"),
        ChangeOp::Update => {
            if entry.update_is_empty {
                page.push_str("<p class=\"empty-update\">Tom ändring.</p>\n");
            }
            version_block(page, &entry.old, &entry.old_address, "Före");
            version_block(page, &entry.new, &entry.new_address, "Efter");
            if !entry.desc_diff.is_empty() {
                // desc_diff is pre-escaped HTML from the diff renderer.
                let _ = write!(page, "<p class=\"diff\">{}</p>\n", entry.desc_diff);
            }
        }
    }

    page.push_str("</section>\n");
}

fn version_block(page: &mut String, version: &TreeVersion, address: &str, label: &str) {
    let _ = write!(page, "<div class=\"version\">\n<h3>{}</h3>\n", escape_html(label));

    field_row(page, "Träd", version.key.as_deref().unwrap_or(""));
    field_row(page, "Sort", version.kind.as_deref().unwrap_or(""));
    field_row(page, "Beskrivning", version.desc.as_deref().unwrap_or(""));
    field_row(page, "Tillagt av", version.by.as_deref().unwrap_or(""));
    if let Some(at) = version.at {
        field_row(page, "Tillagt", &util::format_datetime(at));
    }
    if let Some(pos) = version.pos {
        address_row(page, address, pos);
    }
    if let Some(img) = version.img.as_deref().filter(|i| !i.is_empty()) {
        let _ = write!(
            page,
            "<p><a href=\"{}\">foto</a></p>\n",
            escape_html(&image_page_name(img))
        );
    }

    page.push_str("</div>\n");
}

fn field_row(page: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let _ = write!(
        page,
        "<p><b>{}:</b> {}</p>\n",
        escape_html(label),
        escape_html(value)
    );
}

fn address_row(page: &mut String, address: &str, pos: fruit_map_geo::Position) {
    let _ = write!(
        page,
        "<p><b>Plats:</b> <a href=\"{}\">{}</a> \
         (<a href=\"{}\">osm</a>, <a href=\"{}\">google</a>)</p>\n",
        escape_html(&pos.geohack_url()),
        escape_html(address),
        escape_html(&pos.osm_url()),
        escape_html(&pos.gmaps_url()),
    );
}

/// Wrapper page that shows one hosted photo at a sane size.
fn render_image_page(name: &str) -> String {
    format!(
        "<!doctype html><html lang=\"sv\"><head><meta charset=\"utf-8\">\n\
         <style>\nimg {{\n  height: 90vh;\n  width: 100%;\n  object-fit: contain;\n}}\n</style>\n\
         <title>{}</title></head><body>\n<img alt=\"foto\" src=\"{}\" />\n</body></html>\n",
        escape_html(name),
        escape_html(&image_url(name))
    )
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"fika" & <i>"#),
            "&lt;b&gt;&quot;fika&quot; &amp; &lt;i&gt;"
        );
    }

    #[test]
    fn image_names_map_to_urls_and_pages() {
        assert_eq!(
            image_url("abc123"),
            "https://fruktkartan-thumbs.s3.eu-north-1.amazonaws.com/abc123_1200.jpg"
        );
        assert_eq!(image_page_name("abc123"), "img_abc123.html");
        assert_eq!(image_page_name("abc123.jpg"), "img_abc123.html");
    }

    #[test]
    fn image_page_links_the_hosted_photo() {
        let html = render_image_page("abc123");
        assert!(html.contains(&image_url("abc123")), "{html}");
    }

    #[test]
    fn index_page_renders_entries_with_escaped_content() {
        let history = History::from_rows(vec![fruit_map_database::queries::HistoryRow {
            change_id: 42,
            change_at: Some("2026-08-01 10:30:00".to_string()),
            change_op: "INSERT".to_string(),
            new_key: Some("abc123".to_string()),
            new_kind: Some("Äpple".to_string()),
            new_desc: Some("<script>alert(1)</script>".to_string()),
            new_lat: Some(55.7),
            new_lon: Some(13.2),
            ..fruit_map_database::queries::HistoryRow::default()
        }]);
        let flags = Flags::default();
        let report = Report {
            history: &history,
            flags: &flags,
            since_days: 90,
            generated_at: "2026-08-08 v32".to_string(),
        };

        let html = report.render_index();
        assert!(html.contains("Nytt träd"));
        assert!(html.contains("#42"));
        assert!(html.contains("de senaste 90 dagarna"));
        assert!(html.contains("geohack.toolforge.org"));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
