use chrono::{DateTime, Utc};

/// A loaded schema migration (spec §3 `Migration`). `version` is unique within a runner; the
/// applied set is totally ordered by version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub description: String,
    pub up_sql: String,
    pub down_sql: Option<String>,
}

/// A loaded migration joined with whatever `schema_migrations` says about it (spec §4.H
/// `Status`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: u32,
    pub name: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}
