//! Authoritative world state and the per-tick simulation
//!
//! [`World`] owns every live entity. It never reads the clock itself: each
//! call that depends on time takes the current `Instant`, so a whole match can
//! be replayed in tests with synthetic timestamps.

use crate::config::ServerSettings;
use crate::entity::{Beam, PowerUp, Projectile, Tank, Zone};
use crate::physics::{out_of_bounds, ray_hits_circle, within_tank_radius, wrap_coordinate, WallBounds};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ControlCommand, FireMode, Vector2D, WallRecord, BEAM_LIFETIME_MS, MAX_AMMO, PROJECTILE_SPEED,
    TANK_SIZE, TANK_SPEED,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Every entity in the arena plus the rules that move them
pub struct World {
    /// Ticks simulated so far
    pub tick: u64,
    size: u32,
    half: f64,
    fire_cooldown: Duration,
    respawn_delay: Duration,
    walls: Vec<WallRecord>,
    wall_bounds: Vec<WallBounds>,
    tanks: HashMap<u32, Tank>,
    projectiles: HashMap<u32, Projectile>,
    powerups: HashMap<u32, PowerUp>,
    beams: HashMap<u32, Beam>,
    zones: [Zone; 5],
    rng: StdRng,
    next_object_id: u32,
}

impl World {
    /// Builds the world from settings with an entropy-seeded spawn generator.
    pub fn new(settings: &ServerSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Builds a world whose spawn points are reproducible.
    pub fn with_seed(settings: &ServerSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: &ServerSettings, rng: StdRng) -> Self {
        let walls = settings.wall_records();
        let wall_bounds = walls.iter().map(WallBounds::from_wall).collect();
        let half = settings.universe_size as f64 / 2.0;

        let mut world = Self {
            tick: 0,
            size: settings.universe_size,
            half,
            fire_cooldown: settings.fire_cooldown(),
            respawn_delay: settings.respawn_delay(),
            walls,
            wall_bounds,
            tanks: HashMap::new(),
            projectiles: HashMap::new(),
            powerups: HashMap::new(),
            beams: HashMap::new(),
            zones: spawn_zones(half),
            rng,
            next_object_id: 1,
        };

        for _ in 0..settings.max_powerups {
            let id = world.allocate_id();
            let location = random_location(&mut world.rng, &world.zones);
            world.powerups.insert(
                id,
                PowerUp {
                    id,
                    location,
                    died: false,
                    died_at: None,
                },
            );
        }

        world
    }

    /// Edge length of the square world
    pub fn world_size(&self) -> u32 {
        self.size
    }

    /// Walls in settings-file order
    pub fn walls(&self) -> &[WallRecord] {
        &self.walls
    }

    pub fn tank(&self, id: u32) -> Option<&Tank> {
        self.tanks.get(&id)
    }

    pub fn tanks(&self) -> impl Iterator<Item = &Tank> {
        self.tanks.values()
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn powerups(&self) -> impl Iterator<Item = &PowerUp> {
        self.powerups.values()
    }

    pub fn beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams.values()
    }

    pub fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    pub fn beam_count(&self) -> usize {
        self.beams.len()
    }

    /// Creates the tank for a connection. Returns false if it already exists.
    pub fn add_tank(&mut self, id: u32, name: &str) -> bool {
        if self.tanks.contains_key(&id) {
            return false;
        }

        let location = random_location(&mut self.rng, &self.zones);
        let tank = Tank::new(id, name.trim().to_string(), location);

        info!(
            "Added tank {} ({}) at ({:.0}, {:.0})",
            id, tank.name, location.x, location.y
        );
        self.tanks.insert(id, tank);
        true
    }

    /// Flags a tank as disconnected. It is reported once more by the next
    /// snapshot and then removed by [`World::purge_disconnected`].
    pub fn mark_disconnected(&mut self, id: u32) {
        if let Some(tank) = self.tanks.get_mut(&id) {
            tank.disconnected = true;
            tank.died = true;
            tank.hit_points = 0;
        }
    }

    /// Stores the command as the tank's current intent and attempts to fire.
    ///
    /// Returns the id of the projectile or beam created by the fire attempt.
    pub fn apply_command(&mut self, id: u32, command: &ControlCommand, now: Instant) -> Option<u32> {
        let tank = self.tanks.get_mut(&id)?;
        if tank.disconnected {
            return None;
        }

        if !tank.died {
            tank.move_request = command.moving;
        }
        if let Some(aim) = command.tdir.normalized() {
            tank.aim = aim;
        }

        self.fire(id, command.fire, now)
    }

    /// Main fire is gated by the cooldown, alt fire by ammo.
    pub fn fire(&mut self, id: u32, mode: FireMode, now: Instant) -> Option<u32> {
        let cooldown = self.fire_cooldown;
        let tank = self.tanks.get_mut(&id)?;
        if tank.died || tank.disconnected {
            return None;
        }

        match mode {
            FireMode::None => None,
            FireMode::Main => {
                if let Some(last) = tank.last_fire {
                    if now.saturating_duration_since(last) <= cooldown {
                        return None;
                    }
                }
                tank.last_fire = Some(now);
                let (location, direction) = (tank.location, tank.aim);

                let pid = self.allocate_id();
                self.projectiles.insert(
                    pid,
                    Projectile {
                        id: pid,
                        location,
                        direction,
                        owner: id,
                        died: false,
                    },
                );
                Some(pid)
            }
            FireMode::Alt => {
                if tank.ammo == 0 {
                    return None;
                }
                tank.ammo -= 1;
                let (origin, direction) = (tank.location, tank.aim);

                let bid = self.allocate_id();
                self.beams.insert(
                    bid,
                    Beam {
                        id: bid,
                        origin,
                        direction,
                        owner: id,
                        created_at: now,
                    },
                );
                Some(bid)
            }
        }
    }

    /// Advances the world by one tick.
    pub fn tick(&mut self, now: Instant) {
        self.tick += 1;

        // Projectiles that died last tick have been reported once already.
        self.projectiles.retain(|_, p| !p.died);

        self.respawn(now);
        self.move_tanks();
        self.move_projectiles();
        self.expire_beams(now);
        self.enforce_bounds();
        self.resolve_collisions(now);
    }

    /// Clears one-shot snapshot flags and drops tanks whose disconnect has
    /// now been reported. Called by the broadcaster after serializing.
    pub fn purge_disconnected(&mut self) -> Vec<u32> {
        for tank in self.tanks.values_mut() {
            tank.joined = false;
        }

        let gone: Vec<u32> = self
            .tanks
            .values()
            .filter(|t| t.disconnected)
            .map(|t| t.id)
            .collect();
        for id in &gone {
            self.tanks.remove(id);
            info!("Removed tank {}", id);
        }
        gone
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_object_id;
        self.next_object_id = self.next_object_id.wrapping_add(1).max(1);
        id
    }

    fn respawn(&mut self, now: Instant) {
        let Self {
            tanks,
            powerups,
            zones,
            rng,
            respawn_delay,
            ..
        } = self;

        for tank in tanks.values_mut() {
            if tank.disconnected {
                continue;
            }
            if let Some(died_at) = tank.died_at {
                if now.saturating_duration_since(died_at) > *respawn_delay {
                    tank.revive(random_location(rng, &zones[..]));
                }
            }
        }

        for pow in powerups.values_mut() {
            if let Some(died_at) = pow.died_at {
                if now.saturating_duration_since(died_at) > *respawn_delay {
                    pow.died = false;
                    pow.died_at = None;
                    pow.location = random_location(rng, &zones[..]);
                }
            }
        }
    }

    fn move_tanks(&mut self) {
        for tank in self.tanks.values_mut() {
            if tank.died || tank.disconnected {
                continue;
            }
            tank.pre_move_location = tank.location;
            if let Some(dir) = tank.move_request.unit() {
                tank.location += dir * TANK_SPEED;
                tank.orientation = dir;
            }
        }
    }

    fn move_projectiles(&mut self) {
        for proj in self.projectiles.values_mut() {
            proj.location += proj.direction * PROJECTILE_SPEED;
        }
    }

    fn expire_beams(&mut self, now: Instant) {
        let lifetime = Duration::from_millis(BEAM_LIFETIME_MS);
        self.beams
            .retain(|_, b| now.saturating_duration_since(b.created_at) <= lifetime);
    }

    fn enforce_bounds(&mut self) {
        let half = self.half;

        for tank in self.tanks.values_mut() {
            tank.location.x = wrap_coordinate(tank.location.x, half);
            tank.location.y = wrap_coordinate(tank.location.y, half);
        }

        for proj in self.projectiles.values_mut() {
            if out_of_bounds(proj.location, half) {
                proj.died = true;
            }
        }
    }

    fn resolve_collisions(&mut self, now: Instant) {
        let Self {
            tanks,
            projectiles,
            powerups,
            beams,
            wall_bounds,
            ..
        } = self;

        // Walls stop tanks dead: the whole move is undone.
        for tank in tanks.values_mut().filter(|t| is_live(t)) {
            if wall_bounds.iter().any(|w| w.overlaps_tank(tank.location)) {
                tank.location = tank.pre_move_location;
            }
        }

        for proj in projectiles.values_mut().filter(|p| !p.died) {
            if wall_bounds.iter().any(|w| w.contains(proj.location)) {
                proj.died = true;
            }
        }

        // A tank killed by one hit is skipped by every later check this
        // tick, so each death is scored exactly once.
        let mut scorers = Vec::new();

        for proj in projectiles.values_mut().filter(|p| !p.died) {
            let target = tanks.values_mut().find(|t| {
                is_live(t) && t.id != proj.owner && within_tank_radius(t.location, proj.location)
            });
            if let Some(tank) = target {
                proj.died = true;
                if tank.damage(now) {
                    scorers.push(proj.owner);
                }
            }
        }

        for tank in tanks.values_mut().filter(|t| is_live(t)) {
            for pow in powerups.values_mut().filter(|p| !p.died) {
                if within_tank_radius(tank.location, pow.location) {
                    pow.died = true;
                    pow.died_at = Some(now);
                    tank.ammo = (tank.ammo + 1).min(MAX_AMMO);
                }
            }
        }

        for beam in beams.values() {
            for tank in tanks.values_mut() {
                if !is_live(tank) || tank.id == beam.owner {
                    continue;
                }
                if ray_hits_circle(beam.origin, beam.direction, tank.location, TANK_SIZE / 2.0) {
                    tank.kill(now);
                    scorers.push(beam.owner);
                }
            }
        }

        for owner in scorers {
            if let Some(shooter) = tanks.get_mut(&owner) {
                shooter.score += 1;
            }
        }
    }
}

fn is_live(tank: &Tank) -> bool {
    !tank.died && !tank.disconnected
}

/// Four zones near the edges and one in the centre, scaled to the world.
fn spawn_zones(half: f64) -> [Zone; 5] {
    let zone = |x_min: f64, x_max: f64, y_min: f64, y_max: f64| Zone {
        x_min: x_min * half,
        x_max: x_max * half,
        y_min: y_min * half,
        y_max: y_max * half,
    };

    [
        zone(-0.9, 0.9, -0.9, -0.5),
        zone(-0.9, 0.9, 0.5, 0.9),
        zone(-0.7, -0.5, -0.5, 0.5),
        zone(0.5, 0.7, -0.5, 0.5),
        zone(-0.16, 0.16, -0.2, 0.2),
    ]
}

fn random_location(rng: &mut StdRng, zones: &[Zone]) -> Vector2D {
    let zone = zones[rng.gen_range(0..zones.len())];
    Vector2D::new(
        rng.gen_range(zone.x_min..zone.x_max),
        rng.gen_range(zone.y_min..zone.y_max),
    )
}
