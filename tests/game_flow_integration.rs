//! Integration tests for full match flows.
//!
//! These drive the reducer through complete action resolutions: proposal,
//! challenge, block, block-challenge, forced losses, and AFK removal.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use influence::{
    ActionKind, Card, Command, GamePhase, PlayerId, Profile, Role, Session, SessionSettings,
    SessionStatus,
};

const NAMES: [&str; 6] = ["alice", "bob", "charlie", "dana", "erin", "frank"];

/// A playing session with known hands; the rest of the 15-role pool forms
/// the deck. Seat order follows `hands` order.
fn fixed_session(hands: &[[Role; 2]]) -> (Session, Vec<PlayerId>, DateTime<Utc>) {
    let now = Utc::now();
    let roster: Vec<(PlayerId, Profile)> = hands
        .iter()
        .enumerate()
        .map(|(index, _)| (Uuid::new_v4(), Profile::new(NAMES[index])))
        .collect();
    let mut session = Session::create(Uuid::new_v4(), SessionSettings::default(), &roster, now)
        .expect("valid roster");
    let ids: Vec<PlayerId> = roster.iter().map(|(id, _)| *id).collect();
    let mut pool = Role::full_deck();
    for (id, hand) in ids.iter().zip(hands) {
        for role in hand {
            let index = pool.iter().position(|r| r == role).expect("role available");
            pool.remove(index);
        }
        session.players.get_mut(id).expect("seat exists").cards =
            vec![Card::hidden(hand[0]), Card::hidden(hand[1])];
    }
    session.deck = pool;
    (session, ids, now)
}

/// Roles in circulation: deck plus every card still in front of a player.
fn role_census(session: &Session) -> usize {
    session.deck.len()
        + session
            .players
            .values()
            .map(|player| player.cards.len())
            .sum::<usize>()
}

fn revealed_count(session: &Session, id: PlayerId) -> usize {
    session
        .player(id)
        .expect("seat exists")
        .cards
        .iter()
        .filter(|card| card.revealed)
        .count()
}

#[test]
fn scenario_a_unchallenged_tax() {
    let (mut session, ids, now) = fixed_session(&[
        [Role::Duke, Role::Captain],
        [Role::Assassin, Role::Contessa],
        [Role::Ambassador, Role::Duke],
    ]);
    session
        .apply(
            ids[0],
            &Command::Propose {
                kind: ActionKind::Tax,
                target: None,
            },
            now,
        )
        .expect("tax");
    session.apply(ids[1], &Command::Pass, now).expect("pass");
    session.apply(ids[2], &Command::Pass, now).expect("pass");

    assert_eq!(session.player(ids[0]).expect("seat").coins, 5);
    assert_eq!(session.on_turn(), Some(ids[1]));
    assert_eq!(session.phase, GamePhase::ChoosingAction);
    for id in &ids {
        assert_eq!(revealed_count(&session, *id), 0);
    }
    assert_eq!(role_census(&session), 15);
}

#[test]
fn scenario_b_assassinate_bluff_called_out() {
    let (mut session, ids, now) = fixed_session(&[
        // No assassin in the actor's hand.
        [Role::Duke, Role::Captain],
        [Role::Assassin, Role::Contessa],
        [Role::Ambassador, Role::Duke],
    ]);
    session.players.get_mut(&ids[0]).expect("seat").coins = 3;
    session
        .apply(
            ids[0],
            &Command::Propose {
                kind: ActionKind::Assassinate,
                target: Some(ids[1]),
            },
            now,
        )
        .expect("pays 3 up front");
    assert_eq!(session.player(ids[0]).expect("seat").coins, 0);

    session
        .apply(ids[1], &Command::Challenge, now)
        .expect("target calls the bluff");
    assert_eq!(session.pending_player, Some(ids[0]));
    session
        .apply(ids[0], &Command::ResolveLoss { card_index: 0 }, now)
        .expect("bluffer pays influence");

    assert_eq!(revealed_count(&session, ids[0]), 1);
    assert_eq!(revealed_count(&session, ids[1]), 0);
    // No refund, no assassination; the turn moves on.
    assert_eq!(session.player(ids[0]).expect("seat").coins, 0);
    assert_eq!(session.on_turn(), Some(ids[1]));
    assert_eq!(role_census(&session), 15);
}

#[test]
fn scenario_c_proven_block_cancels_the_steal() {
    let (mut session, ids, now) = fixed_session(&[
        [Role::Captain, Role::Duke],
        // The target really does hold an ambassador.
        [Role::Ambassador, Role::Contessa],
        [Role::Assassin, Role::Duke],
    ]);
    session
        .apply(
            ids[0],
            &Command::Propose {
                kind: ActionKind::Steal,
                target: Some(ids[1]),
            },
            now,
        )
        .expect("steal");
    session.apply(ids[1], &Command::Pass, now).expect("pass");
    session.apply(ids[2], &Command::Pass, now).expect("pass");
    assert_eq!(session.phase, GamePhase::WaitingForBlocks);

    session
        .apply(ids[1], &Command::Block, now)
        .expect("target blocks");
    session
        .apply(ids[2], &Command::Challenge, now)
        .expect("third party disputes the block");

    // The block claim held: the shown card was replaced, never revealed,
    // and the failed challenger owes influence.
    assert_eq!(revealed_count(&session, ids[1]), 0);
    assert_eq!(
        session
            .player(ids[1])
            .expect("seat")
            .unrevealed_roles()
            .len(),
        2
    );
    assert_eq!(session.pending_player, Some(ids[2]));
    session
        .apply(ids[2], &Command::ResolveLoss { card_index: 1 }, now)
        .expect("challenger pays influence");

    // The steal never happened.
    assert_eq!(session.player(ids[0]).expect("seat").coins, 2);
    assert_eq!(session.player(ids[1]).expect("seat").coins, 2);
    assert_eq!(revealed_count(&session, ids[2]), 1);
    assert_eq!(session.on_turn(), Some(ids[1]));
    assert_eq!(role_census(&session), 15);
}

#[test]
fn scenario_d_rich_players_may_still_bluff() {
    let (mut session, ids, now) = fixed_session(&[
        [Role::Duke, Role::Captain],
        [Role::Assassin, Role::Contessa],
    ]);
    session.players.get_mut(&ids[0]).expect("seat").coins = 11;
    session
        .apply(
            ids[0],
            &Command::Propose {
                kind: ActionKind::Exchange,
                target: None,
            },
            now,
        )
        .expect("no forced coup at 10+ coins");
    assert_eq!(session.phase, GamePhase::WaitingForChallenges);
}

#[test]
fn scenario_e_afk_on_turn_player_loses_their_seat() {
    let (mut session, ids, _now) = fixed_session(&[
        [Role::Duke, Role::Captain],
        [Role::Assassin, Role::Contessa],
        [Role::Ambassador, Role::Duke],
    ]);
    let late = session.turn_deadline + TimeDelta::seconds(1);
    session.skip_turn(late).expect("deadline elapsed");

    assert!(!session.players.contains_key(&ids[0]));
    assert_eq!(session.turn_order, vec![ids[1], ids[2]]);
    assert_eq!(session.on_turn(), Some(ids[1]));
    assert_eq!(session.status, SessionStatus::Playing);
    assert_eq!(role_census(&session), 15);

    // With only two seats left, the next removal ends the game.
    let late = session.turn_deadline + TimeDelta::seconds(1);
    session.skip_turn(late).expect("second removal");
    assert_eq!(session.status, SessionStatus::Finished);
    assert_eq!(session.winner, Some(ids[2]));
}

#[test]
fn double_hit_when_the_target_challenges_a_real_assassin() {
    let (mut session, ids, now) = fixed_session(&[
        [Role::Assassin, Role::Duke],
        [Role::Captain, Role::Captain],
        [Role::Ambassador, Role::Contessa],
    ]);
    session.players.get_mut(&ids[0]).expect("seat").coins = 3;
    session
        .apply(
            ids[0],
            &Command::Propose {
                kind: ActionKind::Assassinate,
                target: Some(ids[1]),
            },
            now,
        )
        .expect("assassinate");
    session
        .apply(ids[1], &Command::Challenge, now)
        .expect("target gambles");

    // The claim held, so the target owes a card for the failed challenge...
    assert_eq!(session.pending_player, Some(ids[1]));
    session
        .apply(ids[1], &Command::ResolveLoss { card_index: 0 }, now)
        .expect("first hit");
    // ...and the assassination itself still has to get past a block.
    assert_eq!(session.phase, GamePhase::WaitingForBlocks);
    session
        .apply(ids[1], &Command::Pass, now)
        .expect("no contessa to claim");
    assert_eq!(session.phase, GamePhase::LosingInfluence);
    session
        .apply(ids[1], &Command::ResolveLoss { card_index: 1 }, now)
        .expect("second hit");

    assert!(session.player(ids[1]).expect("seat").is_dead());
    assert_eq!(session.player(ids[1]).expect("seat").coins, 0);
    assert_eq!(session.status, SessionStatus::Playing);
    assert_eq!(session.on_turn(), Some(ids[2]));
    assert_eq!(role_census(&session), 15);
}

#[test]
fn contessa_block_saves_the_target() {
    let (mut session, ids, now) = fixed_session(&[
        [Role::Assassin, Role::Duke],
        [Role::Contessa, Role::Captain],
        [Role::Ambassador, Role::Duke],
    ]);
    session.players.get_mut(&ids[0]).expect("seat").coins = 3;
    session
        .apply(
            ids[0],
            &Command::Propose {
                kind: ActionKind::Assassinate,
                target: Some(ids[1]),
            },
            now,
        )
        .expect("assassinate");
    session.apply(ids[1], &Command::Pass, now).expect("pass");
    session.apply(ids[2], &Command::Pass, now).expect("pass");
    session
        .apply(ids[1], &Command::Block, now)
        .expect("contessa claim");
    // Nobody dares challenge; the block stands.
    session.apply(ids[0], &Command::Pass, now).expect("pass");
    session.apply(ids[2], &Command::Pass, now).expect("pass");

    assert_eq!(revealed_count(&session, ids[1]), 0);
    // The fee stays paid even though the hit was stopped.
    assert_eq!(session.player(ids[0]).expect("seat").coins, 0);
    assert_eq!(session.on_turn(), Some(ids[1]));
}

#[test]
fn a_scripted_match_runs_to_a_single_survivor() {
    let (mut session, ids, start) = fixed_session(&[
        [Role::Duke, Role::Duke],
        [Role::Captain, Role::Captain],
        [Role::Contessa, Role::Contessa],
    ]);
    let mut now = start;
    let mut guard = 0;
    while session.status == SessionStatus::Playing {
        guard += 1;
        assert!(guard < 200, "scripted match failed to terminate");
        let actor = session.on_turn().expect("someone is on turn");
        let coins = session.player(actor).expect("seat").coins;
        if actor == ids[0] && coins >= 7 {
            let target = session
                .living_players()
                .map(|player| player.id)
                .find(|id| *id != ids[0])
                .expect("a target is alive");
            session
                .apply(
                    ids[0],
                    &Command::Propose {
                        kind: ActionKind::Coup,
                        target: Some(target),
                    },
                    now,
                )
                .expect("coup");
            let card_index = session
                .player(target)
                .expect("seat")
                .cards
                .iter()
                .position(|card| !card.revealed)
                .expect("an unrevealed card remains");
            session
                .apply(target, &Command::ResolveLoss { card_index }, now)
                .expect("loss settled");
        } else {
            session
                .apply(
                    actor,
                    &Command::Propose {
                        kind: ActionKind::Income,
                        target: None,
                    },
                    now,
                )
                .expect("income");
        }
        assert_eq!(role_census(&session), 15);
        now += TimeDelta::seconds(1);
    }
    assert_eq!(session.winner, Some(ids[0]));
    // Versions were bumped once per accepted command, never skipped.
    assert!(session.version > 1);
}
