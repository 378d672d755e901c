//! Transaction boundary manager (spec §4.G): begin/commit/rollback lifecycle with isolation
//! control, timeout, panic safety, nested savepoints, and retry on deadlock/serialization
//! failure.
//!
//! No teacher crate models SQL transaction boundaries directly; this is built in the idiom of
//! `dbr-retry`'s config/builder/event style (a policy type, an event enum, an `EventListeners`
//! collection) and composed with `dbr-classify`/`dbr-backoff` for the deadlock/serialization
//! retry loop. The panic guard follows the same `catch_unwind` shape as
//! `dbr_core::events::EventListeners::emit`, adapted to an async body via `futures::FutureExt`.

mod events;
mod manager;
mod options;

pub use events::TransactionEvent;
pub use manager::{TransactionManager, TxFuture};
pub use options::{AccessMode, IsolationLevel, TransactionOptions};
