//! Replicated data model for a match: the session record, its players, and
//! the role deck.

use chrono::{DateTime, TimeDelta, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};
use uuid::Uuid;

use super::constants;

/// Opaque authenticated identity minted by the external identity provider.
/// The engine never authenticates anyone itself.
pub type ParticipantId = Uuid;

/// A participant seated in a session.
pub type PlayerId = ParticipantId;

pub type SessionId = Uuid;

/// Display profile handed over by the identity provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Profile {
    pub display_name: String,
}

impl Profile {
    #[must_use]
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
        }
    }
}

/// The five court roles. Three copies of each make up the deck.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Role {
    Duke,
    Assassin,
    Captain,
    Ambassador,
    Contessa,
}

impl Role {
    pub const ALL: [Self; 5] = [
        Self::Duke,
        Self::Assassin,
        Self::Captain,
        Self::Ambassador,
        Self::Contessa,
    ];

    /// A fresh, unshuffled 15-role deck.
    #[must_use]
    pub fn full_deck() -> Vec<Self> {
        let mut deck = Vec::with_capacity(constants::DECK_SIZE);
        for role in Self::ALL {
            for _ in 0..constants::ROLE_COPIES {
                deck.push(role);
            }
        }
        deck
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Duke => "duke",
            Self::Assassin => "assassin",
            Self::Captain => "captain",
            Self::Ambassador => "ambassador",
            Self::Contessa => "contessa",
        };
        write!(f, "{repr}")
    }
}

/// A face-down influence card. Losing influence reveals it permanently.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Card {
    pub role: Role,
    pub revealed: bool,
}

impl Card {
    #[must_use]
    pub const fn hidden(role: Role) -> Self {
        Self {
            role,
            revealed: false,
        }
    }
}

/// Everything a player can do on their turn.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ActionKind {
    Income,
    ForeignAid,
    Coup,
    Tax,
    Steal,
    Assassinate,
    Exchange,
}

impl ActionKind {
    /// Upfront cost, deducted before any challenge or block resolves.
    #[must_use]
    pub const fn cost(self) -> u32 {
        match self {
            Self::Coup => constants::COUP_COST,
            Self::Assassinate => constants::ASSASSINATE_COST,
            _ => 0,
        }
    }

    /// The role implicitly claimed by taking this action. Actions without a
    /// claim cannot be challenged.
    #[must_use]
    pub const fn claim(self) -> Option<Role> {
        match self {
            Self::Tax => Some(Role::Duke),
            Self::Steal => Some(Role::Captain),
            Self::Assassinate => Some(Role::Assassin),
            Self::Exchange => Some(Role::Ambassador),
            Self::Income | Self::ForeignAid | Self::Coup => None,
        }
    }

    /// Roles that legitimately block this action.
    #[must_use]
    pub const fn block_claims(self) -> &'static [Role] {
        match self {
            Self::Steal => &[Role::Captain, Role::Ambassador],
            Self::Assassinate => &[Role::Contessa],
            Self::ForeignAid => &[Role::Duke],
            _ => &[],
        }
    }

    #[must_use]
    pub const fn blockable(self) -> bool {
        matches!(self, Self::Steal | Self::Assassinate | Self::ForeignAid)
    }

    #[must_use]
    pub const fn requires_target(self) -> bool {
        matches!(self, Self::Coup | Self::Steal | Self::Assassinate)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Income => "income",
            Self::ForeignAid => "foreign aid",
            Self::Coup => "coup",
            Self::Tax => "tax",
            Self::Steal => "steal",
            Self::Assassinate => "assassinate",
            Self::Exchange => "exchange",
        };
        write!(f, "{repr}")
    }
}

/// The current step of the per-action resolution protocol, independent of
/// whose turn it is.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GamePhase {
    ChoosingAction,
    WaitingForChallenges,
    WaitingForBlocks,
    WaitingForBlockChallenges,
    LosingInfluence,
    ResolvingExchange,
}

impl GamePhase {
    /// Phases that wait on reactions from the table rather than on a single
    /// obligated player.
    #[must_use]
    pub const fn is_reaction_window(self) -> bool {
        matches!(
            self,
            Self::WaitingForChallenges | Self::WaitingForBlocks | Self::WaitingForBlockChallenges
        )
    }
}

/// What happens once a pending influence loss settles. Kept apart from
/// [`GamePhase`]: the phase says where the protocol is, this says where it
/// goes afterwards.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PostLossContinuation {
    /// The interrupted action goes ahead: a challenge against it failed, or
    /// a block of it was exposed as a bluff.
    ContinueAction,
    /// The action was a bluff and is dropped.
    ActionCancelled,
    /// A challenged block survived; the action stays cancelled.
    BlockedEnd,
}

/// The action currently working its way through the resolution protocol.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub actor: PlayerId,
    pub target: Option<PlayerId>,
    pub blocked_by: Option<PlayerId>,
    pub continuation: Option<PostLossContinuation>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SessionStatus {
    Waiting,
    Playing,
    Finished,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Finished => "finished",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub coins: u32,
    pub cards: Vec<Card>,
    pub is_host: bool,
}

impl Player {
    /// Dead players have every influence revealed. Derived, never stored.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.cards.iter().all(|card| card.revealed)
    }

    /// Roles this player still holds face down.
    #[must_use]
    pub fn unrevealed_roles(&self) -> Vec<Role> {
        self.cards
            .iter()
            .filter(|card| !card.revealed)
            .map(|card| card.role)
            .collect()
    }

    /// Index of an unrevealed card matching any of `roles`.
    #[must_use]
    pub fn find_unrevealed(&self, roles: &[Role]) -> Option<usize> {
        self.cards
            .iter()
            .position(|card| !card.revealed && roles.contains(&card.role))
    }
}

/// Per-session tuning. Window durations and roster bounds are configuration
/// rather than hard-coded so the lobby can vary table speed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SessionSettings {
    pub max_players: usize,
    pub starting_coins: u32,
    pub action_window_secs: i64,
    pub reaction_window_secs: i64,
    pub log_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::new(
            constants::MAX_PLAYERS,
            constants::STARTING_COINS,
            constants::ACTION_WINDOW_SECS,
            constants::REACTION_WINDOW_SECS,
            constants::LOG_CAPACITY,
        )
    }
}

impl SessionSettings {
    #[must_use]
    pub const fn new(
        max_players: usize,
        starting_coins: u32,
        action_window_secs: i64,
        reaction_window_secs: i64,
        log_capacity: usize,
    ) -> Self {
        Self {
            max_players,
            starting_coins,
            action_window_secs,
            reaction_window_secs,
            log_capacity,
        }
    }

    #[must_use]
    pub fn action_window(&self) -> TimeDelta {
        TimeDelta::seconds(self.action_window_secs)
    }

    #[must_use]
    pub fn reaction_window(&self) -> TimeDelta {
        TimeDelta::seconds(self.reaction_window_secs)
    }
}

/// Notable moments kept in the session's bounded history.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SessionEvent {
    ActionProposed {
        actor: String,
        kind: ActionKind,
        target: Option<String>,
    },
    Passed {
        player: String,
    },
    Challenged {
        challenger: String,
        accused: String,
    },
    ClaimProved {
        accused: String,
    },
    BluffExposed {
        accused: String,
    },
    Blocked {
        blocker: String,
    },
    BlockStood {
        blocker: String,
    },
    InfluenceLost {
        player: String,
        role: Role,
    },
    Eliminated {
        player: String,
    },
    Exchanged {
        player: String,
    },
    TimeoutPass,
    SeatRemoved {
        player: String,
    },
    MatchStarted,
    MatchReset,
    GameOver {
        winner: Option<String>,
    },
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::ActionProposed {
                actor,
                kind,
                target: Some(target),
            } => format!("{actor} proposed {kind} against {target}"),
            Self::ActionProposed { actor, kind, .. } => format!("{actor} proposed {kind}"),
            Self::Passed { player } => format!("{player} passed"),
            Self::Challenged {
                challenger,
                accused,
            } => format!("{challenger} challenged {accused}"),
            Self::ClaimProved { accused } => format!("{accused} proved their claim"),
            Self::BluffExposed { accused } => format!("{accused} was bluffing"),
            Self::Blocked { blocker } => format!("{blocker} blocked the action"),
            Self::BlockStood { blocker } => format!("{blocker}'s block stood"),
            Self::InfluenceLost { player, role } => format!("{player} lost a {role}"),
            Self::Eliminated { player } => format!("{player} is out of the game"),
            Self::Exchanged { player } => format!("{player} exchanged cards with the court deck"),
            Self::TimeoutPass => "reaction window expired".to_string(),
            Self::SeatRemoved { player } => format!("{player} was removed from the table"),
            Self::MatchStarted => "the match started".to_string(),
            Self::MatchReset => "the match was reset".to_string(),
            Self::GameOver {
                winner: Some(winner),
            } => format!("{winner} won the game"),
            Self::GameOver { .. } => "the game ended with no winner".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// The complete persisted state for one match. The whole record is the unit
/// of replication: every accepted mutation bumps `version` and the record is
/// written wholesale to the session store.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    /// Players by stable id. Seating lives in `turn_order`, so removing a
    /// seat never renumbers anyone here.
    pub players: BTreeMap<PlayerId, Player>,
    pub turn_order: Vec<PlayerId>,
    pub turn_index: usize,
    /// Face-down role pool.
    pub deck: Vec<Role>,
    pub phase: GamePhase,
    pub current_action: Option<PendingAction>,
    /// Who owes a card loss or an exchange selection.
    pub pending_player: Option<PlayerId>,
    /// Roles on offer while an exchange resolves: the exchanger's unrevealed
    /// roles plus two fresh draws.
    pub exchange_buffer: Vec<Role>,
    /// Reactors that declined to act in the open window.
    pub passed_players: BTreeSet<PlayerId>,
    pub logs: VecDeque<SessionEvent>,
    pub version: u64,
    pub turn_deadline: DateTime<Utc>,
    pub status: SessionStatus,
    pub winner: Option<PlayerId>,
    pub settings: SessionSettings,
}

impl Session {
    /// Seat currently holding the turn.
    #[must_use]
    pub fn on_turn(&self) -> Option<PlayerId> {
        self.turn_order.get(self.turn_index).copied()
    }

    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn living_players(&self) -> impl Iterator<Item = &Player> {
        self.turn_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .filter(|player| !player.is_dead())
    }

    #[must_use]
    pub fn living_count(&self) -> usize {
        self.living_players().count()
    }

    #[must_use]
    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.players.get(&id).is_some_and(|player| !player.is_dead())
    }

    #[must_use]
    pub fn display_name(&self, id: PlayerId) -> String {
        self.players
            .get(&id)
            .map_or_else(|| id.to_string(), |player| player.display_name.clone())
    }

    pub(crate) fn push_event(&mut self, event: SessionEvent) {
        if self.settings.log_capacity > 0 && self.logs.len() >= self.settings.log_capacity {
            self.logs.pop_front();
        }
        self.logs.push_back(event);
    }

    pub(crate) fn shuffle_deck(&mut self) {
        self.deck.shuffle(&mut rand::rng());
    }

    /// The session as `viewer` is allowed to see it: everyone's coins and
    /// revealed cards, but face-down roles only for the viewer's own hand,
    /// and the exchange offer only for the exchanger.
    #[must_use]
    pub fn view_for(&self, viewer: PlayerId) -> SessionView {
        let players = self
            .turn_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|player| {
                let cards = player
                    .cards
                    .iter()
                    .map(|card| CardView {
                        role: (card.revealed || player.id == viewer).then_some(card.role),
                        revealed: card.revealed,
                    })
                    .collect();
                PlayerView {
                    id: player.id,
                    display_name: player.display_name.clone(),
                    coins: player.coins,
                    cards,
                    is_dead: player.is_dead(),
                    is_host: player.is_host,
                }
            })
            .collect();
        SessionView {
            id: self.id,
            status: self.status,
            phase: self.phase,
            on_turn: self.on_turn(),
            players,
            current_action: self.current_action.clone(),
            pending_player: self.pending_player,
            exchange_offer: (self.pending_player == Some(viewer)
                && self.phase == GamePhase::ResolvingExchange)
                .then(|| self.exchange_buffer.clone()),
            deck_size: self.deck.len(),
            turn_deadline: self.turn_deadline,
            version: self.version,
            winner: self.winner,
            logs: self.logs.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A card as one particular viewer sees it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CardView {
    /// `None` while the card is face down and belongs to someone else.
    pub role: Option<Role>,
    pub revealed: bool,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub display_name: String,
    pub coins: u32,
    pub cards: Vec<CardView>,
    pub is_dead: bool,
    pub is_host: bool,
}

/// One participant's perspective on the session, ready for presentation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub status: SessionStatus,
    pub phase: GamePhase,
    pub on_turn: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub current_action: Option<PendingAction>,
    pub pending_player: Option<PlayerId>,
    pub exchange_offer: Option<Vec<Role>>,
    pub deck_size: usize,
    pub turn_deadline: DateTime<Utc>,
    pub version: u64,
    pub winner: Option<PlayerId>,
    pub logs: Vec<String>,
}
