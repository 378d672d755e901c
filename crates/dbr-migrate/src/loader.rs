use crate::migration::Migration;
use dbr_core::{DbError, DbErrorKind};
use std::collections::BTreeMap;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// Parses a `<NNN>_<name>.<up|down>.sql` filename into its version, name, and direction, per
/// spec §4.H `Loading`. Returns `None` for anything that doesn't match — the caller logs a
/// warning and skips it.
fn parse_filename(filename: &str) -> Option<(u32, String, Direction)> {
    let stem = filename.strip_suffix(".sql")?;
    let (stem, direction) = if let Some(s) = stem.strip_suffix(".up") {
        (s, Direction::Up)
    } else if let Some(s) = stem.strip_suffix(".down") {
        (s, Direction::Down)
    } else {
        return None;
    };

    let (version_part, name_part) = stem.split_once('_')?;
    let version: u32 = version_part.parse().ok()?;
    if name_part.is_empty() {
        return None;
    }

    Some((version, name_part.to_string(), direction))
}

/// Merges filesystem entries into [`Migration`]s (spec §4.H `Loading`).
///
/// `entries` is iterated in the order given and not re-sorted: per the spec's own call-out, a
/// later-processed file for the same `(version, direction)` pair overwrites any content
/// collected from an earlier one. Entries whose filename doesn't match the expected pattern
/// are ignored with a warning.
pub fn load_entries<I>(entries: I) -> Vec<Migration>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut by_version: BTreeMap<u32, Migration> = BTreeMap::new();

    for (filename, contents) in entries {
        let Some((version, name, direction)) = parse_filename(&filename) else {
            #[cfg(feature = "tracing")]
            warn!(filename, "migration file name did not match <NNN>_<name>.<up|down>.sql");
            continue;
        };

        let entry = by_version.entry(version).or_insert_with(|| Migration {
            version,
            name: name.clone(),
            description: String::new(),
            up_sql: String::new(),
            down_sql: None,
        });
        entry.name = name;

        match direction {
            Direction::Up => entry.up_sql = contents,
            Direction::Down => entry.down_sql = Some(contents),
        }
    }

    by_version.into_values().collect()
}

/// Walks `dir`, reading every `.sql` file, and loads them per [`load_entries`]. Files that
/// can't be read as UTF-8 text are skipped with a warning rather than failing the whole load.
pub fn load_dir(dir: &Path) -> Result<Vec<Migration>, DbError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| {
        DbError::new(
            DbErrorKind::ConfigInvalid,
            format!("could not read migrations directory {}: {e}", dir.display()),
        )
        .with_source(e)
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| {
            DbError::new(DbErrorKind::ConfigInvalid, e.to_string()).with_source(e)
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        if !filename.ends_with(".sql") {
            continue;
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => entries.push((filename.to_string(), contents)),
            Err(e) => {
                #[cfg(feature = "tracing")]
                warn!(filename, error = %e, "could not read migration file as UTF-8");
            }
        }
    }

    Ok(load_entries(entries))
}
