use crate::config::RouterConfig;
use crate::events::RouterEvent;
use dbr_backoff::{BackoffStrategy, FixedBackoff};
use dbr_classify::RetryOnPolicy;
use dbr_core::events::EventListeners;
use dbr_core::DbError;
use dbr_pool::{DatabasePool, PgDriver, PoolStatsSnapshot, SqlParam};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::{info, warn};

/// Routes writes to a primary and reads to a healthy replica, retrying writes on a
/// retryable error class (spec §4.J).
///
/// Grounded on `tower-resilience-reconnect`'s health-state-plus-backoff-loop shape
/// (`policy.rs`/`state.rs`) and `tower-resilience-healthcheck`'s `SelectionStrategy::Random`,
/// repointed at Postgres backends instead of generic upstream targets.
pub struct ReplicaRouter {
    primary: Arc<DatabasePool<PgDriver>>,
    replicas: Vec<Arc<DatabasePool<PgDriver>>>,
    healthy: Vec<AtomicBool>,
    config: RouterConfig,
    event_listeners: EventListeners<RouterEvent>,
}

impl ReplicaRouter {
    pub fn new(
        primary: Arc<DatabasePool<PgDriver>>,
        replicas: Vec<Arc<DatabasePool<PgDriver>>>,
        config: RouterConfig,
    ) -> Self {
        let healthy = replicas.iter().map(|_| AtomicBool::new(true)).collect();
        Self {
            primary,
            replicas,
            healthy,
            config,
            event_listeners: EventListeners::new(),
        }
    }

    pub fn on_event<F>(&mut self, listener: F)
    where
        F: Fn(&RouterEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(dbr_core::events::FnListener::new(listener));
    }

    /// Healthy-replica indices, the basis for [`Self::pick_replica`] and the health-loop
    /// invariant "if any replica is healthy, no read is routed to primary".
    fn healthy_indices(&self) -> Vec<usize> {
        self.healthy
            .iter()
            .enumerate()
            .filter(|(_, h)| h.load(Ordering::Relaxed))
            .map(|(i, _)| i)
            .collect()
    }

    /// `GetReplica()`: uniformly at random among healthy replicas, or `None` (route to
    /// primary) if none are healthy.
    fn pick_replica(&self) -> Option<usize> {
        let healthy = self.healthy_indices();
        if healthy.is_empty() {
            return None;
        }
        let pick = rand::random_range(0..healthy.len());
        Some(healthy[pick])
    }

    /// Routes a read query to a healthy replica, falling back to the primary when none are
    /// healthy.
    pub async fn query(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<sqlx::postgres::PgRow>, DbError> {
        self.read_target().query(ctx, sql, args).await
    }

    /// Routes a single-row read query the same way as [`Self::query`].
    pub async fn query_row(
        &self,
        ctx: &CancellationToken,
        sql: &str,
        args: &[SqlParam],
    ) -> Result<sqlx::postgres::PgRow, DbError> {
        self.read_target().query_one(ctx, sql, args).await
    }

    fn read_target(&self) -> &DatabasePool<PgDriver> {
        match self.pick_replica() {
            Some(index) => {
                self.emit(RouterEvent::ReadRoutedToReplica {
                    replica_index: index,
                    timestamp: Instant::now(),
                });
                &self.replicas[index]
            }
            None => {
                self.emit(RouterEvent::ReadRoutedToPrimary {
                    timestamp: Instant::now(),
                    reason: if self.replicas.is_empty() {
                        "no replicas configured"
                    } else {
                        "no healthy replicas"
                    },
                });
                &self.primary
            }
        }
    }

    /// `Exec`: always primary, retried on a retryable error class.
    pub async fn exec(&self, ctx: &CancellationToken, sql: &str, args: &[SqlParam]) -> Result<u64, DbError> {
        self.with_write_retry(|| self.primary.exec(ctx, sql, args)).await
    }

    /// `Begin`/`BeginTx`: always primary, retried on a retryable error class (the acquire,
    /// not the transaction body). Races the whole acquire against `ctx`, since `begin` has no
    /// SQL of its own to pass a token through to.
    pub async fn begin(&self, ctx: &CancellationToken) -> Result<sqlx::Transaction<'_, sqlx::Postgres>, DbError> {
        tokio::select! {
            result = self.with_write_retry(|| self.primary.begin()) => result,
            _ = ctx.cancelled() => Err(DbError::acquire_canceled()),
        }
    }

    /// The primary's pool stats; the primary is the write bottleneck the caller cares about
    /// for capacity planning.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.primary.stats()
    }

    async fn with_write_retry<F, Fut, T>(&self, f: F) -> Result<T, DbError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let retry_on = RetryOnPolicy::default();
        let backoff = FixedBackoff::new(self.config.retry_delay);
        let max_attempts = self.config.max_retries + 1;

        for attempt in 1..=max_attempts {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let tag = dbr_classify::classify(&err);
                    if tag.retryable_under(&retry_on) && attempt < max_attempts {
                        let delay = backoff.delay_for(attempt - 1);
                        self.emit(RouterEvent::WriteRetried {
                            attempt,
                            timestamp: Instant::now(),
                        });
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        unreachable!("loop always returns on the final attempt")
    }

    /// Runs the replica health loop until `token` is cancelled: every
    /// `config.health_check_interval`, pings each replica within
    /// `config.health_check_timeout` and flips its flag, logging transitions. The primary is
    /// never disabled here.
    pub async fn run_health_loop(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.health_check_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.health_tick().await,
                _ = token.cancelled() => return,
            }
        }
    }

    async fn health_tick(&self) {
        for (index, replica) in self.replicas.iter().enumerate() {
            let ok = tokio::time::timeout(self.config.health_check_timeout, replica.ping())
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false);

            let was_healthy = self.healthy[index].swap(ok, Ordering::Relaxed);
            if was_healthy != ok {
                if ok {
                    #[cfg(feature = "tracing")]
                    info!(replica = index, "replica became healthy");
                    self.emit(RouterEvent::ReplicaHealthy {
                        replica_index: index,
                        timestamp: Instant::now(),
                    });
                } else {
                    #[cfg(feature = "tracing")]
                    warn!(replica = index, "replica became unhealthy");
                    self.emit(RouterEvent::ReplicaUnhealthy {
                        replica_index: index,
                        timestamp: Instant::now(),
                    });
                }
            }
        }
    }

    fn emit(&self, event: RouterEvent) {
        self.event_listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    /// Exercises the healthy-index / random-pick logic in isolation. `ReplicaRouter` itself
    /// is concrete over `PgDriver` and needs a live Postgres connection to construct, so its
    /// routing and retry behavior is covered by the workspace integration tests instead.
    fn pick_from(healthy: &[bool]) -> Option<usize> {
        let indices: Vec<usize> = healthy
            .iter()
            .enumerate()
            .filter(|(_, h)| **h)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return None;
        }
        let pick = rand::random_range(0..indices.len());
        Some(indices[pick])
    }

    #[test]
    fn no_healthy_replicas_routes_to_primary() {
        assert_eq!(pick_from(&[false, false]), None);
    }

    #[test]
    fn picks_only_among_healthy_indices() {
        for _ in 0..50 {
            let picked = pick_from(&[false, true, false]).expect("one healthy replica");
            assert_eq!(picked, 1);
        }
    }
}
