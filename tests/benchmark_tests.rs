//! Performance benchmarks for the hot replication paths

use client::games::ghostwriter::{GhostAction, GhostContent, GhostPhase};
use client::games::Ghostwriter;
use client::host::{HostConfig, HostEngine};
use client::replica::ReplicaView;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{leaderboard, Envelope, GameState, Message, Player, RosterEntry, RoundResult};
use std::collections::BTreeMap;
use std::time::Instant;

fn players(count: usize, rng: &mut StdRng) -> Vec<Player> {
    (0..count)
        .map(|i| {
            let entry = RosterEntry::new(format!("p{}", i), format!("Player {}", i));
            let mut player = Player::new(&entry, i == 0);
            player.score = rng.gen_range(0..100);
            player
        })
        .collect()
}

fn busy_state(player_count: usize, rounds: u32) -> GameState<Ghostwriter> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut state = GameState::new(rounds);
    state.players = players(player_count, &mut rng);
    state.round = rounds;
    for round in 1..=rounds {
        let answers: Vec<String> = (0..player_count).map(|i| format!("answer {} {}", round, i)).collect();
        let points: BTreeMap<String, i64> = state
            .players
            .iter()
            .map(|p| (p.id.clone(), rng.gen_range(0..3)))
            .collect();
        state.history.push(RoundResult {
            round,
            content: GhostContent {
                prompt: format!("prompt {}", round),
                answers,
            },
            submissions: Vec::new(),
            tally: BTreeMap::new(),
            winner: Some("p0".to_string()),
            points_awarded: points,
        });
        state.used_content.insert(format!("ghostwriter:{}", round));
    }
    state
}

/// Benchmarks leaderboard ranking
#[test]
fn benchmark_leaderboard_rank() {
    let mut rng = StdRng::seed_from_u64(1);
    let roster = players(64, &mut rng);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let standings = leaderboard::rank(&roster);
        assert_eq!(standings.len(), 64);
    }

    let duration = start.elapsed();
    println!(
        "Leaderboard rank: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot encoding and decoding
#[test]
fn benchmark_snapshot_codec() {
    let envelope = Envelope::new(
        "bench",
        "p0",
        42,
        Message::StateSnapshot {
            state: busy_state(16, 10),
        },
    );

    let iterations = 1_000;
    let start = Instant::now();
    let mut size = 0;

    for _ in 0..iterations {
        let bytes = envelope.encode().unwrap();
        size = bytes.len();
        let decoded = Envelope::<Ghostwriter>::decode(&bytes).unwrap();
        assert_eq!(decoded.version, 42);
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec: {} iterations of {} bytes in {:?} ({:.2} μs/iter)",
        iterations,
        size,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Snapshots must fit one relay datagram
    assert!(size < shared::MAX_DATAGRAM);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks replica application of host deltas
#[test]
fn benchmark_replica_apply() {
    let state = busy_state(16, 3);
    let statuses: BTreeMap<String, bool> = state.players.iter().map(|p| (p.id.clone(), true)).collect();

    let mut view = ReplicaView::<Ghostwriter>::new("bench", RosterEntry::new("p3", "P3"), 2);
    view.apply(&Envelope::new("bench", "p0", 1, Message::StateSnapshot { state }));

    let iterations: u64 = 50_000;
    let start = Instant::now();

    for version in 2..iterations + 2 {
        let message = if version % 2 == 0 {
            Message::ActionUpdate {
                statuses: statuses.clone(),
            }
        } else {
            Message::TimerSync { time_remaining: 30 }
        };
        view.apply(&Envelope::new("bench", "p0", version, message));
    }

    let duration = start.elapsed();
    println!(
        "Replica apply: {} messages in {:?} ({:.2} μs/msg)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(view.version(), iterations + 1);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full host rounds with a crowded room
#[test]
fn benchmark_host_rounds() {
    let host = RosterEntry::new("p0", "Host");
    let roster: Vec<RosterEntry> = (0..32)
        .map(|i| RosterEntry::new(format!("p{}", i), format!("Player {}", i)))
        .collect();

    let rounds = 50;
    let start = Instant::now();

    let mut engine = HostEngine::with_seed(
        Ghostwriter::default(),
        &host,
        HostConfig {
            max_rounds: rounds,
            ..HostConfig::default()
        },
        3,
    );
    engine.sync_roster(&roster);
    engine.set_channel_ready(true);

    for round in 1..=rounds {
        assert_eq!(engine.state().round, round);
        for entry in &roster {
            engine.submit(&entry.id, GhostAction::Answer(format!("{} says {}", entry.id, round)));
        }
        let answers = engine
            .state()
            .content
            .as_ref()
            .map(|c| c.answers.len())
            .unwrap_or(0);
        assert_eq!(answers, roster.len());
        for entry in &roster {
            engine.submit(&entry.id, GhostAction::NoGuess);
        }
        assert!(engine.advance());
        engine.drain_outbox();
    }

    let duration = start.elapsed();
    println!(
        "Host rounds: {} rounds of {} players in {:?} ({:.2} ms/round)",
        rounds,
        roster.len(),
        duration,
        duration.as_millis() as f64 / rounds as f64
    );

    assert!(engine.state().phase.is_game_over());
    assert!(engine
        .ledger()
        .actions(&GhostPhase::Guessing)
        .map(|a| a.len() == roster.len())
        .unwrap_or(false));
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}
