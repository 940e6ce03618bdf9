//! Client-side snapshot reconciliation.

use crate::game::entities::{Session, SessionStatus};

/// What the reconciler decided about an incoming snapshot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeOutcome {
    Accepted,
    /// Stale or duplicate delivery; the local snapshot stands.
    Discarded,
}

/// Keeps the newest accepted snapshot for one participant.
///
/// There is no merging of concurrent edits. The change feed delivers whole
/// records at least once, so the only job here is dropping stale and
/// duplicate deliveries by version. A snapshot that moves the match back to
/// `Waiting` is an explicit reset and is accepted unconditionally.
#[derive(Clone, Debug)]
pub struct Reconciler {
    current: Session,
}

impl Reconciler {
    #[must_use]
    pub fn new(initial: Session) -> Self {
        Self { current: initial }
    }

    #[must_use]
    pub fn current(&self) -> &Session {
        &self.current
    }

    pub fn offer(&mut self, incoming: Session) -> MergeOutcome {
        let reset = incoming.status == SessionStatus::Waiting
            && self.current.status != SessionStatus::Waiting;
        if !reset && incoming.version <= self.current.version {
            log::debug!(
                "session {}: discarding snapshot v{} against local v{}",
                incoming.id,
                incoming.version,
                self.current.version
            );
            return MergeOutcome::Discarded;
        }
        self.current = incoming;
        MergeOutcome::Accepted
    }

    /// Adopt a snapshot this client just wrote itself.
    pub fn force(&mut self, snapshot: Session) {
        self.current = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Profile, SessionSettings};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_session() -> Session {
        let roster = vec![
            (Uuid::new_v4(), Profile::new("alice")),
            (Uuid::new_v4(), Profile::new("bob")),
        ];
        Session::create(Uuid::new_v4(), SessionSettings::default(), &roster, Utc::now())
            .expect("valid roster")
    }

    #[test]
    fn newer_snapshots_are_accepted() {
        let session = sample_session();
        let mut reconciler = Reconciler::new(session.clone());
        let mut newer = session;
        newer.version += 1;
        assert_eq!(reconciler.offer(newer), MergeOutcome::Accepted);
        assert_eq!(reconciler.current().version, 2);
    }

    #[test]
    fn stale_and_duplicate_deliveries_are_discarded() {
        let mut session = sample_session();
        session.version = 5;
        let mut reconciler = Reconciler::new(session.clone());

        let duplicate = session.clone();
        assert_eq!(reconciler.offer(duplicate), MergeOutcome::Discarded);

        let mut stale = session;
        stale.version = 3;
        assert_eq!(reconciler.offer(stale), MergeOutcome::Discarded);
        assert_eq!(reconciler.current().version, 5);
    }

    #[test]
    fn a_reset_to_waiting_is_accepted_regardless_of_version() {
        let mut session = sample_session();
        session.version = 9;
        let mut reconciler = Reconciler::new(session.clone());

        let mut reset = session;
        reset.status = SessionStatus::Waiting;
        reset.version = 2;
        assert_eq!(reconciler.offer(reset), MergeOutcome::Accepted);
        assert_eq!(reconciler.current().version, 2);
        assert_eq!(reconciler.current().status, SessionStatus::Waiting);
    }
}
