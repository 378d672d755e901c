//! Error classification (spec §4.A).
//!
//! Maps any error surfaced by the driver, a transaction, or a command to a [`RetryTag`] —
//! the decision the retry engine (`dbr-retry`) and transaction manager (`dbr-transaction`)
//! act on. Generalizes `tower-resilience-circuitbreaker`'s `FailureClassifier<Res, Err>`
//! (which only answers "is this a failure") into "what *kind* of failure is this."

use dbr_core::{DbError, DbErrorKind};

/// The retryability taxonomy (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryTag {
    /// A transient server-side condition (resource exhaustion, disk full, too many
    /// connections, ...).
    RetryableTransient,
    /// The server detected a deadlock.
    RetryableDeadlock,
    /// The server reported a serialization failure under `SERIALIZABLE` isolation.
    RetryableSerialization,
    /// The connection was lost or refused.
    RetryableConnection,
    /// Not retryable under any policy.
    NonRetryable,
    /// The caller's own deadline or cancellation signal fired; never retried.
    Cancellation,
}

impl RetryTag {
    /// Maps this tag to the [`DbErrorKind`] a caller would see it surfaced as.
    pub fn as_error_kind(&self) -> DbErrorKind {
        match self {
            RetryTag::RetryableTransient => DbErrorKind::QueryFailed,
            RetryTag::RetryableDeadlock => DbErrorKind::Deadlock,
            RetryTag::RetryableSerialization => DbErrorKind::SerializationFailure,
            RetryTag::RetryableConnection => DbErrorKind::ConnectionLost,
            RetryTag::NonRetryable => DbErrorKind::QueryFailed,
            RetryTag::Cancellation => DbErrorKind::Timeout,
        }
    }

    /// Whether this tag is retried under the given policy flags.
    ///
    /// `Cancellation` retries only if `policy.query_cancel` opts in; every other flag defaults
    /// to retrying and this one defaults to not, since retrying a caller's own cancellation is
    /// rarely what's wanted.
    pub fn retryable_under(&self, policy: &RetryOnPolicy) -> bool {
        match self {
            RetryTag::RetryableTransient => policy.timeout,
            RetryTag::RetryableDeadlock => policy.deadlock,
            RetryTag::RetryableSerialization => policy.deadlock,
            RetryTag::RetryableConnection => policy.connection_loss,
            RetryTag::NonRetryable => false,
            RetryTag::Cancellation => policy.query_cancel,
        }
    }
}

/// Which retry-tag classes a retry policy has opted into (spec §3 `retry_on`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOnPolicy {
    pub timeout: bool,
    pub connection_loss: bool,
    pub deadlock: bool,
    pub query_cancel: bool,
}

impl Default for RetryOnPolicy {
    /// All transient classes retried by default; cancellation is controlled separately.
    fn default() -> Self {
        Self {
            timeout: true,
            connection_loss: true,
            deadlock: true,
            query_cancel: false,
        }
    }
}

impl RetryOnPolicy {
    pub fn none() -> Self {
        Self {
            timeout: false,
            connection_loss: false,
            deadlock: false,
            query_cancel: false,
        }
    }
}

/// Anything that can be classified: a structured server code, a cancellation predicate,
/// and a human-readable message to fall back to substring matching on.
pub trait Classifiable {
    /// The server's `SQLSTATE` (or equivalent structured error code), if the error carries one.
    fn sqlstate(&self) -> Option<String>;
    /// Whether this error represents the caller's own cancellation/deadline firing, as
    /// opposed to a server- or network-side failure.
    fn is_cancellation(&self) -> bool;
    /// The error's display message, used for last-resort substring matching.
    fn message(&self) -> String;
}

impl Classifiable for DbError {
    fn sqlstate(&self) -> Option<String> {
        None
    }

    fn is_cancellation(&self) -> bool {
        self.kind() == DbErrorKind::Timeout
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

/// Lets an `Arc`-wrapped error satisfy a `Classifiable + Clone` bound (e.g.
/// `RetryEngine::execute`) when the underlying error, like `DbError`, is not itself `Clone`.
impl<T: Classifiable + ?Sized> Classifiable for std::sync::Arc<T> {
    fn sqlstate(&self) -> Option<String> {
        (**self).sqlstate()
    }

    fn is_cancellation(&self) -> bool {
        (**self).is_cancellation()
    }

    fn message(&self) -> String {
        (**self).message()
    }
}

#[cfg(feature = "sqlx")]
impl Classifiable for sqlx::Error {
    fn sqlstate(&self) -> Option<String> {
        match self {
            sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
            _ => None,
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed)
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

const MESSAGE_PATTERNS: &[(&str, RetryTag)] = &[
    ("deadlock", RetryTag::RetryableDeadlock),
    ("serialization", RetryTag::RetryableSerialization),
    ("connection reset", RetryTag::RetryableConnection),
    ("connection refused", RetryTag::RetryableConnection),
    ("broken pipe", RetryTag::RetryableConnection),
    ("connection closed", RetryTag::RetryableConnection),
    ("timeout", RetryTag::RetryableTransient),
    ("temporary failure", RetryTag::RetryableTransient),
    ("try again", RetryTag::RetryableTransient),
];

/// Transient-resource-exhaustion SQLSTATE codes (class 53, plus io_error / cannot_connect_now).
const TRANSIENT_CODES: &[&str] = &["53000", "53100", "53200", "53300", "58030", "57P03"];

/// Classifies an error per spec §4.A, in rule order:
/// 1. structured server code
/// 2. cancellation predicate
/// 3. message substring search
/// 4. `NonRetryable`
pub fn classify(error: &dyn Classifiable) -> RetryTag {
    if let Some(code) = error.sqlstate() {
        let code = code.as_str();
        if code == "40P01" {
            return RetryTag::RetryableDeadlock;
        }
        if code == "40001" {
            return RetryTag::RetryableSerialization;
        }
        if TRANSIENT_CODES.contains(&code) {
            return RetryTag::RetryableTransient;
        }
        if code.starts_with("08") {
            return RetryTag::RetryableConnection;
        }
    }

    if error.is_cancellation() {
        return RetryTag::Cancellation;
    }

    let message = error.message().to_ascii_lowercase();
    for (pattern, tag) in MESSAGE_PATTERNS {
        if message.contains(pattern) {
            return *tag;
        }
    }

    RetryTag::NonRetryable
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        sqlstate: Option<&'static str>,
        cancellation: bool,
        message: &'static str,
    }

    impl Classifiable for Fake {
        fn sqlstate(&self) -> Option<String> {
            self.sqlstate.map(|s| s.to_string())
        }
        fn is_cancellation(&self) -> bool {
            self.cancellation
        }
        fn message(&self) -> String {
            self.message.to_string()
        }
    }

    fn fake(sqlstate: Option<&'static str>, cancellation: bool, message: &'static str) -> Fake {
        Fake {
            sqlstate,
            cancellation,
            message,
        }
    }

    #[test]
    fn deadlock_sqlstate_classified() {
        assert_eq!(
            classify(&fake(Some("40P01"), false, "")),
            RetryTag::RetryableDeadlock
        );
    }

    #[test]
    fn serialization_sqlstate_classified() {
        assert_eq!(
            classify(&fake(Some("40001"), false, "")),
            RetryTag::RetryableSerialization
        );
    }

    #[test]
    fn transient_resource_codes_classified() {
        for code in TRANSIENT_CODES {
            assert_eq!(
                classify(&fake(Some(code), false, "")),
                RetryTag::RetryableTransient,
                "code {code}"
            );
        }
    }

    #[test]
    fn connection_class_codes_classified() {
        assert_eq!(
            classify(&fake(Some("08006"), false, "")),
            RetryTag::RetryableConnection
        );
    }

    #[test]
    fn cancellation_takes_priority_over_message() {
        assert_eq!(
            classify(&fake(None, true, "deadlock detected")),
            RetryTag::Cancellation
        );
    }

    #[test]
    fn sqlstate_takes_priority_over_cancellation() {
        assert_eq!(
            classify(&fake(Some("40P01"), true, "")),
            RetryTag::RetryableDeadlock
        );
    }

    #[test]
    fn message_substring_fallback_is_case_insensitive() {
        assert_eq!(
            classify(&fake(None, false, "Connection RESET by peer")),
            RetryTag::RetryableConnection
        );
        assert_eq!(
            classify(&fake(None, false, "please Try Again later")),
            RetryTag::RetryableTransient
        );
    }

    #[test]
    fn unmatched_error_is_non_retryable() {
        assert_eq!(
            classify(&fake(None, false, "syntax error at or near")),
            RetryTag::NonRetryable
        );
    }

    #[test]
    fn retryable_under_respects_policy_flags() {
        let policy = RetryOnPolicy {
            timeout: false,
            connection_loss: true,
            deadlock: true,
            query_cancel: false,
        };
        assert!(!RetryTag::RetryableTransient.retryable_under(&policy));
        assert!(RetryTag::RetryableConnection.retryable_under(&policy));
        assert!(RetryTag::RetryableDeadlock.retryable_under(&policy));
        assert!(RetryTag::RetryableSerialization.retryable_under(&policy));
        assert!(!RetryTag::Cancellation.retryable_under(&RetryOnPolicy::default()));
    }

    #[test]
    fn query_cancel_flag_controls_cancellation_retry() {
        let mut policy = RetryOnPolicy::default();
        assert!(!RetryTag::Cancellation.retryable_under(&policy));
        policy.query_cancel = true;
        assert!(RetryTag::Cancellation.retryable_under(&policy));
    }

    #[test]
    fn none_policy_retries_nothing() {
        let policy = RetryOnPolicy::none();
        assert!(!RetryTag::RetryableTransient.retryable_under(&policy));
        assert!(!RetryTag::RetryableDeadlock.retryable_under(&policy));
        assert!(!RetryTag::RetryableConnection.retryable_under(&policy));
    }
}
