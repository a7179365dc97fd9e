// Sync markers: timestamp files deciding whether the durable config copy is newer.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

/// Read a marker. Missing, empty or unparsable markers read as `None`.
pub fn read_marker(path: &Path) -> Option<DateTime<Utc>> {
    let text = fs::read_to_string(path).ok()?;
    let parsed = parse_marker(&text);
    if parsed.is_none() {
        debug!(path = %path.display(), "ignoring unparsable sync marker");
    }
    parsed
}

/// Markers hold an RFC 3339 timestamp; bare unix seconds are accepted too.
pub fn parse_marker(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.with_timezone(&Utc));
    }
    text.parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0))
}

pub fn write_marker(path: &Path, at: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    fs::write(path, format!("{}\n", at.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .with_context(|| format!("failed to write sync marker `{}`", path.display()))
}

/// Restore wins only when the durable copy is strictly newer, or when local
/// has no marker while durable does. Ties and missing markers keep local.
pub fn durable_is_newer(local: Option<DateTime<Utc>>, durable: Option<DateTime<Utc>>) -> bool {
    match (local, durable) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(local), Some(durable)) => durable > local,
    }
}
