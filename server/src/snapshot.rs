//! Per-tick world serialization
//!
//! A snapshot is every tank, then every projectile, power-up and beam, one
//! JSON object per line. Building it is also the point where disconnected
//! tanks get their final report and leave the world.

use crate::game::World;
use log::error;
use serde::Serialize;

/// Serializes the world and retires the tanks whose disconnect it reports.
pub fn build_snapshot(world: &mut World) -> String {
    let mut out = String::with_capacity(256 * (world.tank_count() + world.projectile_count() + 8));

    for tank in world.tanks() {
        push_line(&mut out, &tank.to_record());
    }
    for proj in world.projectiles() {
        push_line(&mut out, &proj.to_record());
    }
    for pow in world.powerups() {
        push_line(&mut out, &pow.to_record());
    }
    for beam in world.beams() {
        push_line(&mut out, &beam.to_record());
    }

    world.purge_disconnected();
    out
}

/// The join reply: assigned id, world size, then one line per wall.
pub fn handshake(id: u32, world_size: u32, walls: &[shared::WallRecord]) -> String {
    let mut out = format!("{}\n{}\n", id, world_size);
    for wall in walls {
        push_line(&mut out, wall);
    }
    out
}

fn push_line<T: Serialize>(out: &mut String, record: &T) {
    match serde_json::to_string(record) {
        Ok(json) => {
            out.push_str(&json);
            out.push('\n');
        }
        Err(e) => error!("Failed to serialize record: {}", e),
    }
}
