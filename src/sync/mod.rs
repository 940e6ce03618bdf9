//! Session synchronization: the shared-record store, client-side
//! reconciliation, and timeout supervision.
//!
//! Replication is whole-snapshot. Every accepted mutation writes the
//! complete record at `version + 1` and the change feed fans it out to every
//! participant, at least once, in best-effort order. There is no referee:
//! each client computes next states locally and the compare-and-swap write
//! decides races.

pub mod clock;
pub mod codec;
pub mod reconciler;
pub mod store;
pub mod supervisor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use reconciler::{MergeOutcome, Reconciler};
pub use store::{MemoryStore, SessionStore, StoreError};
pub use supervisor::TimeoutSupervisor;

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::game::entities::{ParticipantId, Session, SessionId, SessionStatus};
use crate::game::state_machine::Command;
use crate::stats::{GameKind, MatchOutcome, MatchResult, OutcomeSink};

/// Attempts at the reduce-then-write cycle before a command is dropped.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// One participant's connection to a session: reduce locally, publish
/// through the store, reconcile whatever the feed delivers.
pub struct Participant<S, C, O> {
    id: ParticipantId,
    session_id: SessionId,
    store: Arc<S>,
    clock: Arc<C>,
    sink: Arc<O>,
    reconciler: Reconciler,
    outcome_reported: bool,
}

impl<S: SessionStore, C: Clock, O: OutcomeSink> Participant<S, C, O> {
    /// Attach to an existing session, returning the driver and its change
    /// feed subscription.
    pub async fn join(
        id: ParticipantId,
        session_id: SessionId,
        store: Arc<S>,
        clock: Arc<C>,
        sink: Arc<O>,
    ) -> anyhow::Result<(Self, broadcast::Receiver<Session>)> {
        let initial = store
            .read(session_id)
            .await
            .context("reading session record")?;
        let feed = store
            .subscribe(session_id)
            .await
            .context("subscribing to change feed")?;
        let outcome_reported = initial.status == SessionStatus::Finished;
        let participant = Self {
            id,
            session_id,
            store,
            clock,
            sink,
            reconciler: Reconciler::new(initial),
            outcome_reported,
        };
        Ok((participant, feed))
    }

    #[must_use]
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Last accepted snapshot.
    #[must_use]
    pub fn session(&self) -> &Session {
        self.reconciler.current()
    }

    /// Merge a snapshot delivered on the change feed. On the transition to
    /// `Finished` this participant reports its own outcome, fire-and-forget.
    pub async fn observe(&mut self, incoming: Session) -> MergeOutcome {
        let outcome = self.reconciler.offer(incoming);
        if outcome == MergeOutcome::Accepted {
            if self.reconciler.current().status == SessionStatus::Waiting {
                // A reset re-arms outcome reporting for the next match.
                self.outcome_reported = false;
            }
            self.report_outcome_if_finished().await;
        }
        outcome
    }

    /// Reduce a command against the last accepted snapshot and publish the
    /// result. Returns `false` when the reducer rejected the command (a
    /// silent no-op by contract) or every write attempt lost its race.
    pub async fn submit(&mut self, command: Command) -> anyhow::Result<bool> {
        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let mut next = self.reconciler.current().clone();
            let expected = next.version;
            if next.apply(self.id, &command, self.clock.now()).is_err() {
                return Ok(false);
            }
            match self.store.write(self.session_id, expected, &next).await {
                Ok(()) => {
                    self.reconciler.force(next);
                    self.report_outcome_if_finished().await;
                    return Ok(true);
                }
                Err(StoreError::VersionConflict { found, .. }) => {
                    log::debug!(
                        "session {}: write attempt {attempt} lost to v{found}, re-reading",
                        self.session_id
                    );
                    let fresh = self
                        .store
                        .read(self.session_id)
                        .await
                        .context("re-reading after version conflict")?;
                    self.reconciler.offer(fresh);
                }
                // Neither retried nor rolled back: local state may run ahead
                // of the record until the next accepted snapshot.
                Err(error) => return Err(error).context("writing session record"),
            }
        }
        Ok(false)
    }

    async fn report_outcome_if_finished(&mut self) {
        let session = self.reconciler.current();
        if self.outcome_reported || session.status != SessionStatus::Finished {
            return;
        }
        self.outcome_reported = true;
        let outcome = MatchOutcome {
            participant: self.id,
            game: GameKind::Coup,
            result: if session.winner == Some(self.id) {
                MatchResult::Win
            } else {
                MatchResult::Loss
            },
            duration_secs: (self.clock.now() - session.created_at).num_seconds(),
        };
        if let Err(error) = self.sink.record(outcome).await {
            log::warn!(
                "session {}: outcome report dropped: {error}",
                self.session_id
            );
        }
    }
}
