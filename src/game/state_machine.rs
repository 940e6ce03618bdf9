//! The local reducer: pure transition functions implementing the per-action
//! resolution protocol.
//!
//! Every participant runs the same reducer against its last accepted
//! snapshot; whichever client acts computes the complete next snapshot and
//! publishes it through the sync layer. Nothing here suspends or reads
//! ambient time: callers inject `now` and publish the result themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use thiserror::Error;

use super::constants;
use super::entities::{
    ActionKind, Card, GamePhase, ParticipantId, PendingAction, Player, PlayerId,
    PostLossContinuation, Profile, Role, Session, SessionEvent, SessionId, SessionSettings,
    SessionStatus,
};

/// Why an operation was rejected. The dispatch surface treats every variant
/// as a silent no-op; the variants exist so tests can assert on the reason.
#[derive(Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum TransitionError {
    #[error("not your turn")]
    OutOfTurn,
    #[error("not valid in the current phase")]
    InvalidPhase,
    #[error("not eligible to react")]
    Ineligible,
    #[error("need >= ${cost}")]
    InsufficientCoins { cost: u32 },
    #[error("invalid target")]
    InvalidTarget,
    #[error("invalid card")]
    InvalidCard,
    #[error("invalid exchange selection")]
    InvalidSelection,
    #[error("no loss pending for this player")]
    NotPending,
    #[error("deadline not reached")]
    DeadlineNotReached,
    #[error("game not in progress")]
    NotPlaying,
    #[error("only the host can do that")]
    NotHost,
    #[error("need 2+ players")]
    NotEnoughPlayers,
    #[error("game is full")]
    CapacityReached,
    #[error("player does not exist")]
    UnknownPlayer,
}

/// A participant request against the session, produced by the presentation
/// layer and fed through [`Session::apply`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Command {
    Propose {
        kind: ActionKind,
        target: Option<PlayerId>,
    },
    Pass,
    Challenge,
    Block,
    ResolveLoss {
        card_index: usize,
    },
    ResolveExchange {
        keep: Vec<usize>,
    },
    Start,
    Reset,
    Leave,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Propose { kind, .. } => format!("propose {kind}"),
            Self::Pass => "pass".to_string(),
            Self::Challenge => "challenge".to_string(),
            Self::Block => "block".to_string(),
            Self::ResolveLoss { .. } => "resolve influence loss".to_string(),
            Self::ResolveExchange { .. } => "resolve exchange".to_string(),
            Self::Start => "start the match".to_string(),
            Self::Reset => "reset the match".to_string(),
            Self::Leave => "leave the table".to_string(),
        };
        write!(f, "{repr}")
    }
}

impl Session {
    /// Deal a fresh match. The first roster entry hosts; seating follows
    /// roster order.
    pub fn create(
        id: SessionId,
        settings: SessionSettings,
        roster: &[(ParticipantId, Profile)],
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if roster.len() < constants::MIN_PLAYERS {
            return Err(TransitionError::NotEnoughPlayers);
        }
        if roster.len() > settings.max_players {
            return Err(TransitionError::CapacityReached);
        }
        let mut session = Self {
            id,
            created_at: now,
            players: BTreeMap::new(),
            turn_order: Vec::with_capacity(roster.len()),
            turn_index: 0,
            deck: Vec::new(),
            phase: GamePhase::ChoosingAction,
            current_action: None,
            pending_player: None,
            exchange_buffer: Vec::new(),
            passed_players: BTreeSet::new(),
            logs: VecDeque::new(),
            version: 0,
            turn_deadline: now,
            status: SessionStatus::Waiting,
            winner: None,
            settings,
        };
        for (index, (participant, profile)) in roster.iter().enumerate() {
            session.players.insert(
                *participant,
                Player {
                    id: *participant,
                    display_name: profile.display_name.clone(),
                    coins: 0,
                    cards: Vec::with_capacity(constants::CARDS_PER_PLAYER),
                    is_host: index == 0,
                },
            );
            session.turn_order.push(*participant);
        }
        session.deal(now);
        session.version = 1;
        Ok(session)
    }

    /// Single dispatch surface for participant commands.
    ///
    /// Rejections are part of the protocol, not failures: the caller treats
    /// them as no-ops and publishes nothing. A successful command bumps
    /// `version`, making the result a new snapshot to write.
    pub fn apply(
        &mut self,
        caller: PlayerId,
        command: &Command,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let result = match command {
            Command::Propose { kind, target } => self.propose_action(caller, *kind, *target, now),
            Command::Pass => self.pass(caller, now),
            Command::Challenge => self.challenge(caller, now),
            Command::Block => self.block(caller, now),
            Command::ResolveLoss { card_index } => self.resolve_loss(caller, *card_index, now),
            Command::ResolveExchange { keep } => self.resolve_exchange(caller, keep, now),
            Command::Start => self.start(caller, now),
            Command::Reset => self.reset(caller, now),
            Command::Leave => self.leave(caller, now),
        };
        match result {
            Ok(()) => {
                self.version += 1;
                Ok(())
            }
            Err(error) => {
                log::debug!(
                    "session {}: dropped '{command}' from {caller}: {error}",
                    self.id
                );
                Err(error)
            }
        }
    }

    /// Timeout supervisor entry point: synthesize the default transition for
    /// an elapsed deadline.
    ///
    /// Safe to race: a skip computed against an already-advanced snapshot
    /// fails the deadline check (or the subsequent store write) and no-ops.
    pub fn skip_turn(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_playing()?;
        if now < self.turn_deadline {
            return Err(TransitionError::DeadlineNotReached);
        }
        match self.phase {
            GamePhase::ChoosingAction => {
                let staller = self.on_turn().ok_or(TransitionError::InvalidPhase)?;
                self.force_remove(staller, now);
            }
            GamePhase::LosingInfluence | GamePhase::ResolvingExchange => {
                let staller = self.pending_player.ok_or(TransitionError::InvalidPhase)?;
                self.force_remove(staller, now);
            }
            GamePhase::WaitingForChallenges
            | GamePhase::WaitingForBlocks
            | GamePhase::WaitingForBlockChallenges => {
                self.push_event(SessionEvent::TimeoutPass);
                self.resolve_no_objection(now);
            }
        }
        self.version += 1;
        Ok(())
    }

    fn ensure_playing(&self) -> Result<(), TransitionError> {
        if self.status == SessionStatus::Playing {
            Ok(())
        } else {
            Err(TransitionError::NotPlaying)
        }
    }

    fn propose_action(
        &mut self,
        actor: PlayerId,
        kind: ActionKind,
        target: Option<PlayerId>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_playing()?;
        if self.phase != GamePhase::ChoosingAction {
            return Err(TransitionError::InvalidPhase);
        }
        if self.on_turn() != Some(actor) {
            return Err(TransitionError::OutOfTurn);
        }
        let target = if kind.requires_target() {
            let target = target.ok_or(TransitionError::InvalidTarget)?;
            if target == actor || !self.is_alive(target) {
                return Err(TransitionError::InvalidTarget);
            }
            Some(target)
        } else {
            None
        };
        let cost = kind.cost();
        {
            let player = self
                .players
                .get_mut(&actor)
                .ok_or(TransitionError::UnknownPlayer)?;
            if player.coins < cost {
                return Err(TransitionError::InsufficientCoins { cost });
            }
            // Paid up front, before any challenge or block resolves; a
            // cancelled action does not refund it.
            player.coins -= cost;
        }
        self.current_action = Some(PendingAction {
            kind,
            actor,
            target,
            blocked_by: None,
            continuation: None,
        });
        self.passed_players.clear();
        let actor_name = self.display_name(actor);
        let target_name = target.map(|id| self.display_name(id));
        self.push_event(SessionEvent::ActionProposed {
            actor: actor_name,
            kind,
            target: target_name,
        });
        match kind {
            ActionKind::Income => self.apply_action_effect(now),
            ActionKind::Coup => {
                self.phase = GamePhase::LosingInfluence;
                self.pending_player = target;
                self.turn_deadline = now + self.settings.action_window();
            }
            ActionKind::ForeignAid => {
                self.phase = GamePhase::WaitingForBlocks;
                self.turn_deadline = now + self.settings.reaction_window();
            }
            ActionKind::Tax | ActionKind::Steal | ActionKind::Assassinate | ActionKind::Exchange => {
                self.phase = GamePhase::WaitingForChallenges;
                self.turn_deadline = now + self.settings.reaction_window();
            }
        }
        Ok(())
    }

    fn pass(&mut self, reactor: PlayerId, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_playing()?;
        if !self.phase.is_reaction_window() {
            return Err(TransitionError::InvalidPhase);
        }
        let eligible = self.eligible_reactors();
        if !eligible.contains(&reactor) {
            return Err(TransitionError::Ineligible);
        }
        self.passed_players.insert(reactor);
        let name = self.display_name(reactor);
        self.push_event(SessionEvent::Passed { player: name });
        if eligible
            .iter()
            .all(|id| self.passed_players.contains(id))
        {
            self.resolve_no_objection(now);
        }
        Ok(())
    }

    fn challenge(&mut self, challenger: PlayerId, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_playing()?;
        if !self.is_alive(challenger) {
            return Err(TransitionError::Ineligible);
        }
        let action = self
            .current_action
            .as_ref()
            .ok_or(TransitionError::InvalidPhase)?;
        let (accused, claims, on_proof, on_bluff) = match self.phase {
            GamePhase::WaitingForChallenges => {
                let claim = action.kind.claim().ok_or(TransitionError::Ineligible)?;
                (
                    action.actor,
                    vec![claim],
                    PostLossContinuation::ContinueAction,
                    PostLossContinuation::ActionCancelled,
                )
            }
            GamePhase::WaitingForBlockChallenges => {
                let blocker = action.blocked_by.ok_or(TransitionError::InvalidPhase)?;
                (
                    blocker,
                    action.kind.block_claims().to_vec(),
                    PostLossContinuation::BlockedEnd,
                    PostLossContinuation::ContinueAction,
                )
            }
            _ => return Err(TransitionError::InvalidPhase),
        };
        if challenger == accused {
            return Err(TransitionError::Ineligible);
        }
        let challenger_name = self.display_name(challenger);
        let accused_name = self.display_name(accused);
        self.push_event(SessionEvent::Challenged {
            challenger: challenger_name,
            accused: accused_name.clone(),
        });
        let proof = self
            .players
            .get(&accused)
            .and_then(|player| player.find_unrevealed(&claims));
        if let Some(index) = proof {
            // Claim proved: the shown card returns to the deck and is
            // replaced by a fresh draw, never revealed. The challenger owes
            // influence instead.
            if let Some(role) = self.players.get(&accused).map(|p| p.cards[index].role) {
                self.deck.push(role);
                self.shuffle_deck();
                if let (Some(replacement), Some(player)) =
                    (self.deck.pop(), self.players.get_mut(&accused))
                {
                    player.cards[index] = Card::hidden(replacement);
                }
            }
            self.push_event(SessionEvent::ClaimProved {
                accused: accused_name,
            });
            self.begin_influence_loss(challenger, on_proof, now);
        } else {
            self.push_event(SessionEvent::BluffExposed {
                accused: accused_name,
            });
            self.begin_influence_loss(accused, on_bluff, now);
        }
        Ok(())
    }

    fn block(&mut self, blocker: PlayerId, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_playing()?;
        if self.phase != GamePhase::WaitingForBlocks {
            return Err(TransitionError::InvalidPhase);
        }
        let action = self
            .current_action
            .as_ref()
            .ok_or(TransitionError::InvalidPhase)?;
        if !action.kind.blockable() {
            return Err(TransitionError::Ineligible);
        }
        if !self.eligible_reactors().contains(&blocker) {
            return Err(TransitionError::Ineligible);
        }
        if let Some(action) = self.current_action.as_mut() {
            action.blocked_by = Some(blocker);
        }
        self.passed_players.clear();
        self.phase = GamePhase::WaitingForBlockChallenges;
        self.turn_deadline = now + self.settings.reaction_window();
        let name = self.display_name(blocker);
        self.push_event(SessionEvent::Blocked { blocker: name });
        Ok(())
    }

    fn resolve_loss(
        &mut self,
        player: PlayerId,
        card_index: usize,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_playing()?;
        if self.phase != GamePhase::LosingInfluence {
            return Err(TransitionError::InvalidPhase);
        }
        if self.pending_player != Some(player) {
            return Err(TransitionError::NotPending);
        }
        let seat = self
            .players
            .get_mut(&player)
            .ok_or(TransitionError::UnknownPlayer)?;
        let card = seat
            .cards
            .get_mut(card_index)
            .ok_or(TransitionError::InvalidCard)?;
        if card.revealed {
            return Err(TransitionError::InvalidCard);
        }
        card.revealed = true;
        let lost_role = card.role;
        let died = seat.is_dead();
        if died {
            seat.coins = 0;
        }
        let name = seat.display_name.clone();
        self.push_event(SessionEvent::InfluenceLost {
            player: name.clone(),
            role: lost_role,
        });
        if died {
            self.push_event(SessionEvent::Eliminated { player: name });
        }
        self.pending_player = None;

        if self.living_count() <= 1 {
            self.next_turn(now);
            return Ok(());
        }
        let (kind, blocked, continuation) = match self.current_action.as_mut() {
            Some(action) => (
                action.kind,
                action.blocked_by.is_some(),
                action.continuation.take(),
            ),
            None => {
                self.next_turn(now);
                return Ok(());
            }
        };
        match continuation {
            // Coup and an already-applied assassinate carry no continuation;
            // the paid-for loss was the whole effect.
            None
            | Some(PostLossContinuation::ActionCancelled)
            | Some(PostLossContinuation::BlockedEnd) => self.next_turn(now),
            Some(PostLossContinuation::ContinueAction) => {
                if matches!(kind, ActionKind::Steal | ActionKind::Assassinate) && !blocked {
                    // The defended claim still has to survive a block window.
                    self.open_block_window(now);
                } else {
                    self.apply_action_effect(now);
                }
            }
        }
        Ok(())
    }

    fn resolve_exchange(
        &mut self,
        player: PlayerId,
        keep: &[usize],
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_playing()?;
        if self.phase != GamePhase::ResolvingExchange {
            return Err(TransitionError::InvalidPhase);
        }
        if self.pending_player != Some(player) {
            return Err(TransitionError::NotPending);
        }
        let unrevealed_count = self
            .players
            .get(&player)
            .ok_or(TransitionError::UnknownPlayer)?
            .unrevealed_roles()
            .len();
        if keep.len() != unrevealed_count {
            return Err(TransitionError::InvalidSelection);
        }
        let mut seen = BTreeSet::new();
        for &index in keep {
            if index >= self.exchange_buffer.len() || !seen.insert(index) {
                return Err(TransitionError::InvalidSelection);
            }
        }
        let kept: Vec<Role> = keep.iter().map(|&index| self.exchange_buffer[index]).collect();
        let returned: Vec<Role> = self
            .exchange_buffer
            .iter()
            .enumerate()
            .filter(|(index, _)| !seen.contains(index))
            .map(|(_, role)| *role)
            .collect();
        if let Some(seat) = self.players.get_mut(&player) {
            let mut kept = kept.into_iter();
            for card in seat.cards.iter_mut().filter(|card| !card.revealed) {
                if let Some(role) = kept.next() {
                    card.role = role;
                }
            }
        }
        self.deck.extend(returned);
        self.shuffle_deck();
        self.exchange_buffer.clear();
        self.pending_player = None;
        let name = self.display_name(player);
        self.push_event(SessionEvent::Exchanged { player: name });
        self.next_turn(now);
        Ok(())
    }

    fn start(&mut self, caller: PlayerId, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != SessionStatus::Waiting {
            return Err(TransitionError::InvalidPhase);
        }
        let host = self
            .players
            .get(&caller)
            .ok_or(TransitionError::UnknownPlayer)?;
        if !host.is_host {
            return Err(TransitionError::NotHost);
        }
        if self.players.len() < constants::MIN_PLAYERS {
            return Err(TransitionError::NotEnoughPlayers);
        }
        self.deal(now);
        Ok(())
    }

    fn reset(&mut self, caller: PlayerId, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let host = self
            .players
            .get(&caller)
            .ok_or(TransitionError::UnknownPlayer)?;
        if !host.is_host {
            return Err(TransitionError::NotHost);
        }
        self.status = SessionStatus::Waiting;
        self.winner = None;
        self.current_action = None;
        self.pending_player = None;
        self.exchange_buffer.clear();
        self.passed_players.clear();
        self.phase = GamePhase::ChoosingAction;
        self.deck = Role::full_deck();
        for player in self.players.values_mut() {
            player.cards.clear();
            player.coins = self.settings.starting_coins;
        }
        self.turn_index = 0;
        self.turn_deadline = now + self.settings.action_window();
        self.push_event(SessionEvent::MatchReset);
        Ok(())
    }

    fn leave(&mut self, caller: PlayerId, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.players.contains_key(&caller) {
            return Err(TransitionError::UnknownPlayer);
        }
        match self.status {
            SessionStatus::Finished => Err(TransitionError::NotPlaying),
            SessionStatus::Waiting => {
                self.remove_seat(caller);
                if self.players.is_empty() {
                    self.status = SessionStatus::Finished;
                }
                Ok(())
            }
            SessionStatus::Playing => {
                let involved = self.on_turn() == Some(caller)
                    || self.pending_player == Some(caller)
                    || self.current_action.as_ref().is_some_and(|action| {
                        action.actor == caller
                            || action.target == Some(caller)
                            || action.blocked_by == Some(caller)
                    });
                if involved {
                    self.force_remove(caller, now);
                } else {
                    self.remove_seat(caller);
                    if self.living_count() <= 1 {
                        self.finish();
                    } else if self.phase.is_reaction_window() {
                        // The departed seat may have been the last holdout.
                        let eligible = self.eligible_reactors();
                        if eligible
                            .iter()
                            .all(|id| self.passed_players.contains(id))
                        {
                            self.resolve_no_objection(now);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Who may still react in the open window. Empty means the window has
    /// nothing to wait for.
    fn eligible_reactors(&self) -> BTreeSet<PlayerId> {
        let Some(action) = &self.current_action else {
            return BTreeSet::new();
        };
        let living_except = |excluded: PlayerId| -> BTreeSet<PlayerId> {
            self.living_players()
                .map(|player| player.id)
                .filter(|id| *id != excluded)
                .collect()
        };
        match self.phase {
            GamePhase::WaitingForChallenges => living_except(action.actor),
            GamePhase::WaitingForBlocks => match action.kind {
                ActionKind::Steal | ActionKind::Assassinate => action
                    .target
                    .filter(|target| self.is_alive(*target))
                    .into_iter()
                    .collect(),
                _ => living_except(action.actor),
            },
            GamePhase::WaitingForBlockChallenges => match action.blocked_by {
                Some(blocker) => living_except(blocker),
                None => BTreeSet::new(),
            },
            _ => BTreeSet::new(),
        }
    }

    /// The open window closed with no surviving objection.
    fn resolve_no_objection(&mut self, now: DateTime<Utc>) {
        match self.phase {
            GamePhase::WaitingForChallenges => {
                let kind = self.current_action.as_ref().map(|action| action.kind);
                match kind {
                    Some(ActionKind::Steal | ActionKind::Assassinate) => {
                        self.open_block_window(now);
                    }
                    _ => self.apply_action_effect(now),
                }
            }
            GamePhase::WaitingForBlocks => self.apply_action_effect(now),
            GamePhase::WaitingForBlockChallenges => {
                if let Some(blocker) = self
                    .current_action
                    .as_ref()
                    .and_then(|action| action.blocked_by)
                {
                    let name = self.display_name(blocker);
                    self.push_event(SessionEvent::BlockStood { blocker: name });
                }
                self.next_turn(now);
            }
            _ => {}
        }
    }

    fn open_block_window(&mut self, now: DateTime<Utc>) {
        self.phase = GamePhase::WaitingForBlocks;
        self.passed_players.clear();
        self.turn_deadline = now + self.settings.reaction_window();
        if self.eligible_reactors().is_empty() {
            // Nobody left who could block.
            self.apply_action_effect(now);
        }
    }

    fn begin_influence_loss(
        &mut self,
        who: PlayerId,
        continuation: PostLossContinuation,
        now: DateTime<Utc>,
    ) {
        if let Some(action) = self.current_action.as_mut() {
            action.continuation = Some(continuation);
        }
        self.phase = GamePhase::LosingInfluence;
        self.pending_player = Some(who);
        self.turn_deadline = now + self.settings.action_window();
    }

    /// Apply the action's effect now that every objection has been settled.
    fn apply_action_effect(&mut self, now: DateTime<Utc>) {
        let Some(action) = self.current_action.clone() else {
            self.next_turn(now);
            return;
        };
        match action.kind {
            ActionKind::Income => {
                if let Some(actor) = self.players.get_mut(&action.actor) {
                    actor.coins += constants::INCOME_AMOUNT;
                }
                self.next_turn(now);
            }
            ActionKind::Tax => {
                if let Some(actor) = self.players.get_mut(&action.actor) {
                    actor.coins += constants::TAX_AMOUNT;
                }
                self.next_turn(now);
            }
            ActionKind::ForeignAid => {
                if let Some(actor) = self.players.get_mut(&action.actor) {
                    actor.coins += constants::FOREIGN_AID_AMOUNT;
                }
                self.next_turn(now);
            }
            ActionKind::Steal => {
                let amount = action
                    .target
                    .and_then(|target| self.players.get(&target))
                    .map_or(0, |target| target.coins.min(constants::STEAL_AMOUNT));
                if let Some(target) = action
                    .target
                    .and_then(|target| self.players.get_mut(&target))
                {
                    target.coins -= amount;
                }
                if let Some(actor) = self.players.get_mut(&action.actor) {
                    actor.coins += amount;
                }
                self.next_turn(now);
            }
            ActionKind::Assassinate | ActionKind::Coup => {
                match action.target.filter(|target| self.is_alive(*target)) {
                    Some(target) => {
                        if let Some(action) = self.current_action.as_mut() {
                            action.continuation = None;
                        }
                        self.phase = GamePhase::LosingInfluence;
                        self.pending_player = Some(target);
                        self.turn_deadline = now + self.settings.action_window();
                    }
                    // The target died on the way here; nothing left to take.
                    None => self.next_turn(now),
                }
            }
            ActionKind::Exchange => {
                let mut buffer = self
                    .players
                    .get(&action.actor)
                    .map_or_else(Vec::new, Player::unrevealed_roles);
                if buffer.is_empty() {
                    self.next_turn(now);
                    return;
                }
                for _ in 0..constants::EXCHANGE_DRAWS {
                    if let Some(role) = self.deck.pop() {
                        buffer.push(role);
                    }
                }
                self.exchange_buffer = buffer;
                self.phase = GamePhase::ResolvingExchange;
                self.pending_player = Some(action.actor);
                self.turn_deadline = now + self.settings.action_window();
            }
        }
    }

    /// Advance to the next living seat, or end the game.
    fn next_turn(&mut self, now: DateTime<Utc>) {
        self.current_action = None;
        self.pending_player = None;
        self.exchange_buffer.clear();
        self.passed_players.clear();
        if self.living_count() <= 1 {
            self.finish();
            return;
        }
        let seats = self.turn_order.len();
        for offset in 1..=seats {
            let index = (self.turn_index + offset) % seats;
            if self.is_alive(self.turn_order[index]) {
                self.turn_index = index;
                break;
            }
        }
        self.phase = GamePhase::ChoosingAction;
        self.turn_deadline = now + self.settings.action_window();
    }

    fn finish(&mut self) {
        self.status = SessionStatus::Finished;
        let winner = self.living_players().next().map(|player| player.id);
        self.winner = winner;
        let winner_name = self.winner.map(|id| self.display_name(id));
        self.push_event(SessionEvent::GameOver {
            winner: winner_name,
        });
    }

    /// Drop a seat from the roster, returning its face-down roles (or an
    /// in-flight exchange buffer, which already covers them) to the deck so
    /// the 15-role pool stays intact.
    fn remove_seat(&mut self, leaver: PlayerId) {
        let was_exchanger =
            self.phase == GamePhase::ResolvingExchange && self.pending_player == Some(leaver);
        if was_exchanger {
            let buffer: Vec<Role> = self.exchange_buffer.drain(..).collect();
            self.deck.extend(buffer);
        }
        if let Some(player) = self.players.remove(&leaver) {
            if !was_exchanger {
                self.deck.extend(player.unrevealed_roles());
            }
            self.push_event(SessionEvent::SeatRemoved {
                player: player.display_name,
            });
        }
        self.shuffle_deck();
        if let Some(position) = self.turn_order.iter().position(|id| *id == leaver) {
            self.turn_order.remove(position);
            if position < self.turn_index {
                self.turn_index -= 1;
            } else if self.turn_index >= self.turn_order.len() {
                self.turn_index = 0;
            }
        }
        self.passed_players.remove(&leaver);
        // A departed host hands the seat to whoever is first in the order.
        let host_present = self
            .players
            .values()
            .any(|player| player.is_host);
        if !host_present {
            if let Some(player) = self
                .turn_order
                .first()
                .and_then(|id| self.players.get_mut(id))
            {
                player.is_host = true;
            }
        }
    }

    /// Forced removal: the seat leaves the roster entirely and whatever
    /// action was in flight is abandoned.
    fn force_remove(&mut self, staller: PlayerId, now: DateTime<Utc>) {
        let was_actor = self.on_turn() == Some(staller);
        self.remove_seat(staller);
        self.current_action = None;
        self.pending_player = None;
        self.exchange_buffer.clear();
        self.passed_players.clear();
        if self.living_count() <= 1 {
            self.finish();
            return;
        }
        if was_actor {
            // The seat after the removed actor inherits the turn.
            self.advance_past_dead();
            self.phase = GamePhase::ChoosingAction;
            self.turn_deadline = now + self.settings.action_window();
        } else {
            self.next_turn(now);
        }
    }

    /// Settle `turn_index` on a living seat, keeping the current one if it
    /// still qualifies.
    fn advance_past_dead(&mut self) {
        let seats = self.turn_order.len();
        for offset in 0..seats {
            let index = (self.turn_index + offset) % seats;
            if self.is_alive(self.turn_order[index]) {
                self.turn_index = index;
                return;
            }
        }
    }

    /// Shuffle, deal, and open the first turn.
    fn deal(&mut self, now: DateTime<Utc>) {
        self.deck = Role::full_deck();
        self.shuffle_deck();
        for id in self.turn_order.clone() {
            if let Some(player) = self.players.get_mut(&id) {
                player.coins = self.settings.starting_coins;
                player.cards.clear();
                for _ in 0..constants::CARDS_PER_PLAYER {
                    if let Some(role) = self.deck.pop() {
                        player.cards.push(Card::hidden(role));
                    }
                }
            }
        }
        self.turn_index = 0;
        self.current_action = None;
        self.pending_player = None;
        self.exchange_buffer.clear();
        self.passed_players.clear();
        self.winner = None;
        self.phase = GamePhase::ChoosingAction;
        self.status = SessionStatus::Playing;
        self.turn_deadline = now + self.settings.action_window();
        self.push_event(SessionEvent::MatchStarted);
    }
}
