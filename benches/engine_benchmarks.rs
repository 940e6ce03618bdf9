use chrono::{TimeDelta, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use uuid::Uuid;

use influence::{
    ActionKind, Command, PlayerId, Profile, Session, SessionSettings, SessionStatus,
    sync::codec,
};

/// Helper to create a playing session with N seats.
fn setup_session(n_players: usize) -> (Session, Vec<PlayerId>) {
    let roster: Vec<(PlayerId, Profile)> = (0..n_players)
        .map(|i| (Uuid::new_v4(), Profile::new(&format!("player{i}"))))
        .collect();
    let session = Session::create(Uuid::new_v4(), SessionSettings::default(), &roster, Utc::now())
        .expect("valid roster");
    let ids = roster.into_iter().map(|(id, _)| id).collect();
    (session, ids)
}

/// Drive a deterministic match to completion: everyone takes income until
/// the first seat can afford a coup, which it fires at the next living seat.
fn run_scripted_match(mut session: Session, ids: &[PlayerId]) -> Session {
    let mut now = Utc::now();
    let mut guard = 0;
    while session.status == SessionStatus::Playing && guard < 2_000 {
        guard += 1;
        let actor = match session.on_turn() {
            Some(actor) => actor,
            None => break,
        };
        let coins = session.player(actor).map_or(0, |player| player.coins);
        if actor == ids[0] && coins >= 7 {
            let target = session
                .living_players()
                .map(|player| player.id)
                .find(|id| *id != ids[0]);
            if let Some(target) = target {
                let _ = session.apply(
                    actor,
                    &Command::Propose {
                        kind: ActionKind::Coup,
                        target: Some(target),
                    },
                    now,
                );
                if let Some(card_index) = session
                    .player(target)
                    .and_then(|player| player.cards.iter().position(|card| !card.revealed))
                {
                    let _ = session.apply(target, &Command::ResolveLoss { card_index }, now);
                }
            }
        } else {
            let _ = session.apply(
                actor,
                &Command::Propose {
                    kind: ActionKind::Income,
                    target: None,
                },
                now,
            );
        }
        now += TimeDelta::seconds(1);
    }
    session
}

fn bench_full_match(c: &mut Criterion) {
    c.bench_function("full_match_4_players", |b| {
        b.iter(|| {
            let (session, ids) = setup_session(4);
            black_box(run_scripted_match(session, &ids))
        });
    });
}

fn bench_single_reduction(c: &mut Criterion) {
    let (session, ids) = setup_session(6);
    c.bench_function("income_reduction", |b| {
        b.iter(|| {
            let mut next = session.clone();
            let _ = next.apply(
                ids[0],
                &Command::Propose {
                    kind: ActionKind::Income,
                    target: None,
                },
                Utc::now(),
            );
            black_box(next)
        });
    });
}

fn bench_snapshot_codec(c: &mut Criterion) {
    let (session, _ids) = setup_session(6);
    let bytes = codec::encode(&session).expect("encodes");
    c.bench_function("snapshot_encode", |b| {
        b.iter(|| black_box(codec::encode(&session).expect("encodes")));
    });
    c.bench_function("snapshot_decode", |b| {
        b.iter(|| black_box(codec::decode::<Session>(&bytes).expect("decodes")));
    });
}

criterion_group!(
    benches,
    bench_full_match,
    bench_single_reduction,
    bench_snapshot_codec
);
criterion_main!(benches);
