//! Headless bot for exercising a running server: walks toward the nearest
//! enemy and fights it, spending rage on critical strikes when it can.

use clap::Parser;
use env_logger::Env;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ActionPayload, Envelope, MessageType, Position, WorldMirror};
use std::time::{Duration, Instant};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const WALK_STEP: f64 = 3.0;
const ATTACK_COOLDOWN: Duration = Duration::from_secs(1);
const CRITICAL_STRIKE_COST: i32 = 30;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// WebSocket URL of the server
    #[clap(short, long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
    /// How long to play before disconnecting, in seconds
    #[clap(short, long, default_value = "30")]
    duration_secs: u64,
    /// Decision interval in milliseconds
    #[clap(short, long, default_value = "100")]
    tick_ms: u64,
}

struct Bot {
    mirror: WorldMirror,
    rng: StdRng,
    last_attack: Option<Instant>,
}

impl Bot {
    fn new() -> Self {
        Self {
            mirror: WorldMirror::new(),
            rng: StdRng::from_entropy(),
            last_attack: None,
        }
    }

    /// Picks the next message to send, if any.
    fn decide(&mut self) -> Option<Envelope> {
        let me = self.mirror.local_player()?.clone();
        if !me.is_alive() {
            return None;
        }

        let Some(enemy) = self.mirror.nearest_enemy().cloned() else {
            let desired = Position::new(
                me.x + self.rng.gen_range(-WALK_STEP..=WALK_STEP),
                me.y + self.rng.gen_range(-WALK_STEP..=WALK_STEP),
            );
            return self
                .mirror
                .predict_move(desired)
                .map(|pos| Envelope::player_move(&me.id, pos));
        };

        let reach = me.weapon.as_ref().map_or(0.0, |w| w.pixel_range());
        if me.position().distance_to(&enemy.position()) > reach {
            let desired = me.position().step_toward(&enemy.position(), WALK_STEP);
            return self
                .mirror
                .predict_move(desired)
                .map(|pos| Envelope::player_move(&me.id, pos));
        }

        let now = Instant::now();
        if self
            .last_attack
            .map_or(false, |last| now.duration_since(last) < ATTACK_COOLDOWN)
        {
            return None;
        }
        self.last_attack = Some(now);

        let action = if me.class.is_warrior() && me.resource >= CRITICAL_STRIKE_COST {
            "critical_strike"
        } else {
            "attack"
        };
        let payload = ActionPayload::new(action, Some(enemy.id.clone()));
        Some(Envelope::new(
            MessageType::PlayerAction,
            Some(me.id.clone()),
            serde_json::to_value(payload).ok(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (ws, _) = connect_async(args.url.as_str()).await?;
    info!("Connected to {}", args.url);
    let (mut write, mut read) = ws.split();

    let mut bot = Bot::new();
    let mut ticker = interval(Duration::from_millis(args.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Play time over");
                break;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match Envelope::from_text(&text) {
                    Ok(envelope) => {
                        if let Err(e) = bot.mirror.apply(&envelope) {
                            warn!("Could not apply {:?}: {}", envelope.kind, e);
                        }
                        if envelope.kind == MessageType::Error {
                            debug!("Server rejected a request: {:?}", envelope.data);
                        }
                    }
                    Err(e) => warn!("Undecodable message: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            _ = ticker.tick() => {
                if let Some(envelope) = bot.decide() {
                    write.send(Message::Text(envelope.to_text()?)).await?;
                }
            }
        }
    }

    if let Err(e) = write.send(Message::Close(None)).await {
        debug!("Close frame not sent: {}", e);
    }

    let me = bot.mirror.local_player();
    info!(
        "Finished: health {}, rage {}, {} enemies left, {} requests rejected",
        me.map_or(0, |p| p.health),
        me.map_or(0, |p| p.resource),
        bot.mirror.enemies.len(),
        bot.mirror.errors.len()
    );
    Ok(())
}
