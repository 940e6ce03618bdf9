//! Per-client timeout supervision.
//!
//! Each participant runs one of these next to its driver. Timers are never
//! cancelled when the phase advances elsewhere: a skip computed against an
//! already-advanced snapshot fails the reducer's deadline check or loses the
//! compare-and-swap, so racing clients converge on a single mutation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::clock::Clock;
use super::reconciler::{MergeOutcome, Reconciler};
use super::store::{SessionStore, StoreError};
use crate::game::entities::{Session, SessionId, SessionStatus};

/// Tick granularity of the deadline check.
pub const TICK: Duration = Duration::from_secs(1);

pub struct TimeoutSupervisor<S, C> {
    session_id: SessionId,
    store: Arc<S>,
    clock: Arc<C>,
    reconciler: Reconciler,
    /// Snapshot version this client already fired a skip against.
    fired_version: Option<u64>,
}

impl<S: SessionStore, C: Clock> TimeoutSupervisor<S, C> {
    pub fn new(store: Arc<S>, clock: Arc<C>, initial: Session) -> Self {
        Self {
            session_id: initial.id,
            store,
            clock,
            reconciler: Reconciler::new(initial),
            fired_version: None,
        }
    }

    /// Merge a snapshot observed on the change feed.
    pub fn observe(&mut self, incoming: Session) -> MergeOutcome {
        self.reconciler.offer(incoming)
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        self.reconciler.current()
    }

    /// One deadline check. Returns whether a skip was published.
    ///
    /// The `fired_version` latch fires at most once per accepted snapshot;
    /// every accepted snapshot carries a new version, so the latch resets
    /// itself on any phase or turn change.
    pub async fn poll_once(&mut self) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let snapshot = self.reconciler.current();
        if snapshot.status != SessionStatus::Playing || now < snapshot.turn_deadline {
            return Ok(false);
        }
        if self.fired_version == Some(snapshot.version) {
            return Ok(false);
        }
        self.fired_version = Some(snapshot.version);
        let mut next = snapshot.clone();
        let expected = next.version;
        if next.skip_turn(now).is_err() {
            return Ok(false);
        }
        match self.store.write(self.session_id, expected, &next).await {
            Ok(()) => {
                log::info!(
                    "session {}: deadline elapsed, skipped v{expected} -> v{}",
                    self.session_id,
                    next.version
                );
                self.reconciler.force(next);
                Ok(true)
            }
            Err(StoreError::VersionConflict { found, .. }) => {
                // Another client advanced the phase first.
                log::debug!(
                    "session {}: skip lost the race to v{found}",
                    self.session_id
                );
                let fresh = self.store.read(self.session_id).await?;
                self.reconciler.offer(fresh);
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Long-running loop: merge feed deliveries and check the deadline once
    /// per tick. Runs until the feed closes.
    pub async fn run(mut self) {
        let mut feed = match self.store.subscribe(self.session_id).await {
            Ok(feed) => feed,
            Err(error) => {
                log::error!(
                    "session {}: supervisor cannot subscribe: {error}",
                    self.session_id
                );
                return;
            }
        };
        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                delivery = feed.recv() => match delivery {
                    Ok(snapshot) => {
                        self.observe(snapshot);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!(
                            "session {}: supervisor lagged {skipped} snapshots, re-reading",
                            self.session_id
                        );
                        if let Ok(fresh) = self.store.read(self.session_id).await {
                            self.observe(fresh);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tick.tick() => {
                    // Store failures are not retried; the next tick starts
                    // from whatever the feed has delivered since.
                    if let Err(error) = self.poll_once().await {
                        log::warn!(
                            "session {}: skip write failed: {error}",
                            self.session_id
                        );
                    }
                }
            }
        }
    }
}
