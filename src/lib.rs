//! # Influence
//!
//! A turn-based social-deduction game engine (five court roles, bluffing,
//! challenges and blocks) plus the snapshot-replication protocol the
//! platform's mini-games share.
//!
//! There is no server-side referee. Every participant runs the same pure
//! reducer against its last accepted snapshot; whoever acts computes the
//! complete next state and writes it to the shared session record with a
//! compare-and-swap, and a change feed fans each accepted snapshot out to
//! everyone else. Client-side reconciliation drops stale and duplicate
//! deliveries by version, and a per-client timeout supervisor synthesizes
//! pass/skip transitions when a phase deadline lapses.
//!
//! ## Core modules
//!
//! - [`game`]: replicated entities and the per-action resolution state
//!   machine (proposal, challenge, block, block-challenge, forced influence
//!   loss, card exchange, AFK handling).
//! - [`sync`]: the session store contract, reconciler, injected clock, and
//!   timeout supervisor.
//! - [`stats`]: the fire-and-forget outcome sink.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use influence::{ActionKind, Command, Profile, Session, SessionSettings};
//! use uuid::Uuid;
//!
//! let alice = Uuid::new_v4();
//! let bob = Uuid::new_v4();
//! let roster = vec![(alice, Profile::new("alice")), (bob, Profile::new("bob"))];
//! let mut session =
//!     Session::create(Uuid::new_v4(), SessionSettings::default(), &roster, Utc::now())
//!         .expect("valid roster");
//!
//! // The on-turn player takes income: +1 coin, no reaction window.
//! session
//!     .apply(
//!         alice,
//!         &Command::Propose { kind: ActionKind::Income, target: None },
//!         Utc::now(),
//!     )
//!     .expect("legal on turn");
//! assert_eq!(session.player(alice).expect("seated").coins, 3);
//! ```

pub mod game;
pub mod stats;
pub mod sync;

pub use game::{
    constants,
    entities::{
        ActionKind, Card, CardView, GamePhase, ParticipantId, PendingAction, Player, PlayerId,
        PlayerView, PostLossContinuation, Profile, Role, Session, SessionEvent, SessionId,
        SessionSettings, SessionStatus, SessionView,
    },
    state_machine::{Command, TransitionError},
};
pub use stats::{
    ChannelSink, GameKind, LogSink, MatchOutcome, MatchResult, NullSink, OutcomeSink, SinkError,
};
pub use sync::{
    Clock, ManualClock, MemoryStore, MergeOutcome, Participant, Reconciler, SessionStore,
    StoreError, SystemClock, TimeoutSupervisor,
};
