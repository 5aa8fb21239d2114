// src/browser/bookmarks.rs

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    process,
};

use chrono::Local;
use html_escape::{encode_double_quoted_attribute, encode_text};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use tracing::{info, warn};

use super::{backup::BrowserBackup, profiles::BrowserKind};
use crate::{constants::TIMESTAMP_FORMAT, errors::BackupError, export::write_text};

const FIREFOX_BOOKMARKS_QUERY: &str = "SELECT b.title, p.url
     FROM moz_bookmarks b
     JOIN moz_places p ON b.fk = p.id
     WHERE b.type = 1 AND p.url IS NOT NULL
     ORDER BY b.title";

fn html_header(title: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE NETSCAPE-Bookmark-file-1>\n");
    out.push_str("<META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">\n");
    let _ = writeln!(out, "<TITLE>{}</TITLE>", encode_text(title));
    out.push_str("<H1>Bookmarks</H1>\n");
    out.push_str("<DL><p>\n");
    out
}

fn write_link(out: &mut String, title: &str, url: &str) {
    let _ = writeln!(
        out,
        "<DT><A HREF=\"{}\">{}</A>",
        encode_double_quoted_attribute(url),
        encode_text(title)
    );
}

fn write_chromium_folder(out: &mut String, folder: &Value) {
    let Some(children) = folder.get("children").and_then(Value::as_array) else {
        return;
    };
    for child in children {
        let name = child.get("name").and_then(Value::as_str).unwrap_or_default();
        match child.get("type").and_then(Value::as_str) {
            Some("folder") => {
                let _ = writeln!(out, "<DT><H3>{}</H3>\n<DL><p>", encode_text(name));
                write_chromium_folder(out, child);
                out.push_str("</DL><p>\n");
            }
            Some("url") => {
                if let Some(url) = child.get("url").and_then(Value::as_str) {
                    write_link(out, name, url);
                }
            }
            _ => {}
        }
    }
}

/// Renders a Chromium `Bookmarks` JSON document as a Netscape bookmark file.
///
/// The bookmark bar is written at the top level and "Other Bookmarks" as a
/// folder below it.
pub fn chromium_bookmarks_html(bookmarks: &Value, browser: &str) -> String {
    let mut out = html_header(&format!("Bookmarks from {}", browser));
    if let Some(roots) = bookmarks.get("roots") {
        if let Some(bar) = roots.get("bookmark_bar") {
            write_chromium_folder(&mut out, bar);
        }
        if let Some(other) = roots.get("other") {
            out.push_str("<DT><H3>Other Bookmarks</H3>\n<DL><p>\n");
            write_chromium_folder(&mut out, other);
            out.push_str("</DL><p>\n");
        }
    }
    out.push_str("</DL><p>\n");
    out
}

/// Reads `(title, url)` pairs from a Firefox `places.sqlite`.
///
/// The database is copied first because Firefox keeps it locked while running.
pub fn read_firefox_bookmarks(places: &Path) -> Result<Vec<(String, String)>, BackupError> {
    let temp = std::env::temp_dir().join(format!(
        "pc-toolkit-places-{}-{}.sqlite",
        process::id(),
        Local::now().format("%Y%m%d%H%M%S%f")
    ));
    fs::copy(places, &temp)?;
    let result = query_bookmarks(&temp);
    if let Err(e) = fs::remove_file(&temp) {
        warn!("Failed to remove temporary copy {}: {}", temp.display(), e);
    }
    result
}

fn query_bookmarks(database: &Path) -> Result<Vec<(String, String)>, BackupError> {
    let connection = Connection::open_with_flags(database, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut statement = connection.prepare(FIREFOX_BOOKMARKS_QUERY)?;
    let rows = statement.query_map([], |row| {
        Ok((
            row.get::<_, Option<String>>(0)?,
            row.get::<_, Option<String>>(1)?,
        ))
    })?;

    let mut bookmarks = Vec::new();
    for row in rows {
        if let (Some(title), Some(url)) = row? {
            if !title.is_empty() && !url.is_empty() {
                bookmarks.push((title, url));
            }
        }
    }
    Ok(bookmarks)
}

pub fn firefox_bookmarks_html(bookmarks: &[(String, String)]) -> String {
    let mut out = html_header("Bookmarks from Firefox");
    for (title, url) in bookmarks {
        write_link(&mut out, title, url);
    }
    out.push_str("</DL><p>\n");
    out
}

impl BrowserBackup<'_> {
    /// Writes `<Browser>_bookmarks_<timestamp>.html` into the backup root.
    pub fn export_bookmarks_html(
        &self,
        kind: BrowserKind,
        profile: &str,
    ) -> Result<PathBuf, BackupError> {
        let data_path = self
            .locator()
            .data_path(kind)
            .ok_or_else(|| BackupError::BrowserNotInstalled(kind.to_string()))?;
        let profile_path = data_path.join(profile);

        let html = if kind.is_chromium() {
            let file = profile_path.join("Bookmarks");
            if !file.is_file() {
                return Err(BackupError::BookmarksNotFound(file));
            }
            let bookmarks: Value = serde_json::from_str(&fs::read_to_string(&file)?)?;
            chromium_bookmarks_html(&bookmarks, &kind.to_string())
        } else {
            let places = profile_path.join("places.sqlite");
            if !places.is_file() {
                return Err(BackupError::BookmarksNotFound(places));
            }
            firefox_bookmarks_html(&read_firefox_bookmarks(&places)?)
        };

        let output = self.root().join(format!(
            "{}_bookmarks_{}.html",
            kind,
            Local::now().format(TIMESTAMP_FORMAT)
        ));
        write_text(&output, &html)?;
        info!("{} -> bookmarks exported to {}", kind, output.display());
        Ok(output)
    }
}
