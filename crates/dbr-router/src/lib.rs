//! Primary/read-replica router (spec §4.J): writes always go to the primary, reads go to a
//! healthy replica picked uniformly at random, and a background loop tracks replica health.

mod config;
mod events;
mod router;

pub use config::{RouterConfig, RouterConfigBuilder};
pub use events::RouterEvent;
pub use router::ReplicaRouter;
