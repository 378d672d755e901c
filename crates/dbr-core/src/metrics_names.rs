//! Metric name constants (spec §6), kept in one place so every crate agrees on the wire
//! format of its observations instead of restating string literals.

/// `database_query_duration_seconds{query_type,table,operation}` histogram.
pub const QUERY_DURATION_SECONDS: &str = "database_query_duration_seconds";
/// `database_queries_total{query_type,table,operation,status}` counter.
pub const QUERIES_TOTAL: &str = "database_queries_total";
/// `database_query_errors_total{query_type,table,operation,error_type}` counter.
pub const QUERY_ERRORS_TOTAL: &str = "database_query_errors_total";

/// `database_slow_queries_total` counter.
pub const SLOW_QUERIES_TOTAL: &str = "database_slow_queries_total";
/// `db_slow_query_duration_seconds` histogram.
pub const SLOW_QUERY_DURATION_SECONDS: &str = "db_slow_query_duration_seconds";

/// `db_pool_acquired_connections` gauge.
pub const POOL_ACQUIRED: &str = "db_pool_acquired_connections";
/// `db_pool_idle_connections` gauge.
pub const POOL_IDLE: &str = "db_pool_idle_connections";
/// `db_pool_max_connections` gauge.
pub const POOL_MAX: &str = "db_pool_max_connections";
/// `db_pool_total_connections` gauge.
pub const POOL_TOTAL: &str = "db_pool_total_connections";
/// `db_pool_constructing_connections` gauge.
pub const POOL_CONSTRUCTING: &str = "db_pool_constructing_connections";
/// `db_pool_utilization_percent` gauge.
pub const POOL_UTILIZATION_PERCENT: &str = "db_pool_utilization_percent";

/// `db_pool_acquire_count_total` counter.
pub const POOL_ACQUIRE_COUNT_TOTAL: &str = "db_pool_acquire_count_total";
/// `db_pool_canceled_acquire_count_total` counter.
pub const POOL_CANCELED_ACQUIRE_COUNT_TOTAL: &str = "db_pool_canceled_acquire_count_total";
/// `db_pool_empty_acquire_count_total` counter.
pub const POOL_EMPTY_ACQUIRE_COUNT_TOTAL: &str = "db_pool_empty_acquire_count_total";
/// `db_pool_new_connections_total` counter.
pub const POOL_NEW_CONNECTIONS_TOTAL: &str = "db_pool_new_connections_total";
/// `db_pool_max_lifetime_destroy_count_total` counter.
pub const POOL_MAX_LIFETIME_DESTROY_COUNT_TOTAL: &str =
    "db_pool_max_lifetime_destroy_count_total";
/// `db_pool_max_idle_destroy_count_total` counter.
pub const POOL_MAX_IDLE_DESTROY_COUNT_TOTAL: &str = "db_pool_max_idle_destroy_count_total";

/// `database_cache_hits_total` counter.
pub const CACHE_HITS_TOTAL: &str = "database_cache_hits_total";
/// `database_cache_misses_total` counter.
pub const CACHE_MISSES_TOTAL: &str = "database_cache_misses_total";
/// `database_cache_sets_total` counter.
pub const CACHE_SETS_TOTAL: &str = "database_cache_sets_total";

/// `database_migrations_applied_total` counter.
pub const MIGRATIONS_APPLIED_TOTAL: &str = "database_migrations_applied_total";
/// `database_replica_health_flips_total{replica}` counter.
pub const REPLICA_HEALTH_FLIPS_TOTAL: &str = "database_replica_health_flips_total";
