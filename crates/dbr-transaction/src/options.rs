use std::str::FromStr;
use std::time::Duration;

/// The four canonical SQL isolation levels (spec §3 `transaction options`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadCommitted
    }
}

impl FromStr for IsolationLevel {
    type Err = std::convert::Infallible;

    /// Unknown strings map to [`IsolationLevel::ReadCommitted`] rather than erroring, per
    /// spec §4.G's isolation-level mapping.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "read uncommitted" => IsolationLevel::ReadUncommitted,
            "repeatable read" => IsolationLevel::RepeatableRead,
            "serializable" => IsolationLevel::Serializable,
            _ => IsolationLevel::ReadCommitted,
        })
    }
}

/// Whether a transaction may write (spec §3 `access`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "READ ONLY",
            AccessMode::ReadWrite => "READ WRITE",
        }
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        AccessMode::ReadWrite
    }
}

/// Transaction boundary options (spec §3 `transaction options`).
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    pub timeout: Duration,
    pub isolation: IsolationLevel,
    pub access: AccessMode,
    pub deferrable: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            isolation: IsolationLevel::ReadCommitted,
            access: AccessMode::ReadWrite,
            deferrable: false,
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
        }
    }
}

impl TransactionOptions {
    /// `ReadOnly(ctx, fn)`: `RepeatableRead`, `ReadOnly` (spec §4.G).
    pub fn read_only() -> Self {
        Self {
            isolation: IsolationLevel::RepeatableRead,
            access: AccessMode::ReadOnly,
            ..Self::default()
        }
    }

    /// `Write(ctx, fn)`: `ReadCommitted`, 10s timeout (spec §4.G).
    pub fn write() -> Self {
        Self {
            isolation: IsolationLevel::ReadCommitted,
            access: AccessMode::ReadWrite,
            timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// `Batch(ctx, batch_size, fn)`: `ReadCommitted`, 5 minute timeout (spec §4.G).
    pub fn batch() -> Self {
        Self {
            isolation: IsolationLevel::ReadCommitted,
            access: AccessMode::ReadWrite,
            timeout: Duration::from_secs(5 * 60),
            ..Self::default()
        }
    }

    /// The `SET TRANSACTION` statement that applies isolation, access mode, and
    /// deferrability to the transaction this was begun inside.
    pub(crate) fn set_transaction_sql(&self) -> String {
        let mut sql = format!(
            "SET TRANSACTION ISOLATION LEVEL {} {}",
            self.isolation.as_sql(),
            self.access.as_sql()
        );
        if self.deferrable {
            sql.push_str(" DEFERRABLE");
        }
        sql
    }
}
