//! Bind parameters for parameterized queries (spec §4.E `Exec`/`Query`'s `args`).

use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// A single bound value. Covers the scalar types the rest of the workspace's SQL actually
/// passes (migration bookkeeping, transaction bodies, cache-key derivation); callers needing a
/// column type this doesn't cover can still fall back to building the query by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Uuid(sqlx::types::Uuid),
    Timestamp(sqlx::types::chrono::DateTime<sqlx::types::chrono::Utc>),
    Null,
}

impl SqlParam {
    /// Binds this value onto a query builder in place, in the position it was pushed.
    pub fn bind<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlParam::Bool(v) => query.bind(v),
            SqlParam::I32(v) => query.bind(v),
            SqlParam::I64(v) => query.bind(v),
            SqlParam::F64(v) => query.bind(v),
            SqlParam::Text(v) => query.bind(v),
            SqlParam::Uuid(v) => query.bind(v),
            SqlParam::Timestamp(v) => query.bind(v),
            SqlParam::Null => query.bind(None::<String>),
        }
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::I32(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::I64(v)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::F64(v)
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<sqlx::types::Uuid> for SqlParam {
    fn from(v: sqlx::types::Uuid) -> Self {
        SqlParam::Uuid(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlParam::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_none_converts_to_null() {
        let param: SqlParam = Option::<i32>::None.into();
        assert_eq!(param, SqlParam::Null);
    }

    #[test]
    fn option_some_unwraps_inner_conversion() {
        let param: SqlParam = Some(7i32).into();
        assert_eq!(param, SqlParam::I32(7));
    }

    #[test]
    fn str_and_string_both_convert_to_text() {
        assert_eq!(SqlParam::from("abc"), SqlParam::Text("abc".to_string()));
        assert_eq!(SqlParam::from(String::from("abc")), SqlParam::Text("abc".to_string()));
    }
}
