//! Performance benchmarks for the hot paths of the simulation

use server::{ai, combat, Broadcaster, EntityStore};
use shared::{Enemy, Envelope, Player, Position, Room};
use std::collections::BTreeMap;
use std::time::Instant;

/// Benchmarks wall resolution for free and blocked moves
#[test]
fn benchmark_resolve_move() {
    let room = Room::dungeon();
    let cases = [
        (Position::new(400.0, 300.0), Position::new(402.0, 301.0)),
        (Position::new(400.0, 30.0), Position::new(403.0, 27.0)),
        (Position::new(30.0, 30.0), Position::new(27.0, 27.0)),
    ];

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let (old, desired) = cases[i % cases.len()];
        let _ = room.resolve_move(old, desired);
    }

    let duration = start.elapsed();
    println!(
        "Move resolution: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks target selection over a crowded threat table
#[test]
fn benchmark_update_target() {
    let players: BTreeMap<String, Player> = (0..100)
        .map(|i| {
            let id = format!("player-{:03}", i);
            (id.clone(), Player::spawn(id, "sword"))
        })
        .collect();
    let mut enemy = Enemy::basic("e1", "claws", Position::new(200.0, 200.0));
    for (i, id) in players.keys().enumerate() {
        enemy.add_threat(id, (i % 17) as f64);
    }

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = combat::update_target(&mut enemy, &players);
    }

    let duration = start.elapsed();
    println!(
        "Target selection (100 entries): {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(enemy.target_id.is_some());
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a full AI tick with many enemies and players
#[test]
fn benchmark_ai_tick() {
    let mut store = EntityStore::new();
    for i in 0..20 {
        let mut player = Player::spawn(format!("p{:02}", i), "sword");
        player.set_position(Position::new(100.0 + i as f64 * 50.0, 450.0));
        store.insert_player(player);
    }
    for i in 0..50 {
        let pos = Position::new(60.0 + (i % 10) as f64 * 110.0, 100.0 + (i / 10) as f64 * 150.0);
        store.insert_enemy(Enemy::basic(format!("e{:02}", i), "claws", pos));
    }
    // Nobody drains the queue; sends are dropped once it fills
    let (broadcast, _queue) = Broadcaster::channel(1024);
    let room = Room::dungeon();

    let ticks = 200;
    let start = Instant::now();

    for _ in 0..ticks {
        ai::tick(&mut store, &room, Instant::now(), &broadcast);
    }

    let duration = start.elapsed();
    println!(
        "AI tick (50 enemies, 20 players): {} ticks in {:?} ({:.2} ms/tick)",
        ticks,
        duration,
        duration.as_secs_f64() * 1000.0 / ticks as f64
    );

    // Ten ticks per second leaves 100ms per tick
    assert!(duration.as_millis() / ticks < 100);
}

/// Benchmarks envelope encoding of a full enemy snapshot
#[test]
fn benchmark_envelope_encoding() {
    let enemy = Enemy::basic("enemy-benchmark", "claws", Position::new(500.0, 350.0));

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let text = Envelope::enemy_update(&enemy).to_text().unwrap();
        assert!(!text.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "Enemy update encoding: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}
