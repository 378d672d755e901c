//! Shared infrastructure for the `dbr` database access layer.
//!
//! This crate provides the parts every other `dbr-*` crate depends on:
//! - the cross-cutting error taxonomy ([`error`]) used at every public boundary
//! - the event bus ([`events`]) used by the retry engine, circuit breaker, migration
//!   runner, and replica router to emit observability events
//! - metric name constants ([`metrics_names`]) so every crate agrees on one naming scheme

pub mod error;
pub mod events;
pub mod metrics_names;

pub use error::{DbError, DbErrorKind};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
