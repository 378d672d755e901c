use async_trait::async_trait;
use std::time::Duration;

/// Key/TTL store fronting cacheable reads (spec §4.I). The facade is responsible for
/// deciding *what* to cache (deterministic `SELECT`s, keyed on `(normalized_sql,
/// argument_tuple)`) and *when* to invalidate (on a matching write); this trait only stores
/// and retrieves.
#[async_trait]
pub trait QueryCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V>;
    async fn set(&self, key: &str, value: V, ttl: Duration);
    async fn delete(&self, key: &str);
    /// Deletes every key matching `pattern`. `pattern` may contain `*` as a wildcard
    /// (matching any run of characters); a pattern with no `*` matches only an exact key.
    async fn invalidate_pattern(&self, pattern: &str);
}

/// Matches `key` against a glob `pattern` containing zero or more `*` wildcards.
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let mut segments = pattern.split('*').peekable();
    let Some(first) = segments.next() else {
        return key.is_empty();
    };

    if !key.starts_with(first) {
        return false;
    }
    let mut rest = &key[first.len()..];

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            // Last segment: must match the remaining suffix exactly.
            return rest.ends_with(segment);
        }
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_identical_key() {
        assert!(glob_match("users:1", "users:1"));
        assert!(!glob_match("users:1", "users:2"));
    }

    #[test]
    fn trailing_wildcard_matches_any_suffix() {
        assert!(glob_match("users:*", "users:1"));
        assert!(glob_match("users:*", "users:"));
        assert!(!glob_match("users:*", "teams:1"));
    }

    #[test]
    fn leading_and_middle_wildcards_match() {
        assert!(glob_match("*:detail", "users:1:detail"));
        assert!(glob_match("users:*:detail", "users:1:detail"));
        assert!(!glob_match("users:*:detail", "users:1:summary"));
    }
}
