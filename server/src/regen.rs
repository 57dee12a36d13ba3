use crate::broadcast::Broadcaster;
use crate::server::GameContext;
use crate::store::EntityStore;
use log::debug;
use shared::Envelope;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Rage lost per decay step.
pub const RAGE_DECAY: i32 = 2;

/// Decays rage on every warrior holding some. Only players whose value
/// actually changed are broadcast. Returns how many changed.
pub fn tick(store: &mut EntityStore, broadcast: &Broadcaster) -> usize {
    let mut changed = 0;
    for player in store
        .players_mut()
        .filter(|p| p.class.is_warrior() && p.resource > 0)
    {
        if player.drain_resource(RAGE_DECAY) {
            broadcast.send(Envelope::player_update(player));
            changed += 1;
        }
    }
    changed
}

/// Runs [`tick`] every `period` until shutdown.
pub async fn run(ctx: GameContext, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut store = ctx.store.write().await;
                let changed = tick(&mut store, &ctx.broadcast);
                if changed > 0 {
                    debug!("Rage decayed for {} players", changed);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Rage decay loop stopped");
}
