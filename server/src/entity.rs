use shared::{
    BeamRecord, MoveDirection, PowerUpRecord, ProjectileRecord, TankRecord, Vector2D,
    MAX_HIT_POINTS,
};
use std::time::Instant;

/// Server-side tank with the bookkeeping that never goes on the wire
#[derive(Debug, Clone)]
pub struct Tank {
    pub id: u32,
    pub name: String,
    pub location: Vector2D,
    pub orientation: Vector2D,
    pub aim: Vector2D,
    pub hit_points: u8,
    pub score: u32,
    pub died: bool,
    pub disconnected: bool,
    /// True until the tank has appeared in one snapshot
    pub joined: bool,
    pub ammo: u8,
    pub move_request: MoveDirection,
    pub last_fire: Option<Instant>,
    pub died_at: Option<Instant>,
    pub pre_move_location: Vector2D,
}

impl Tank {
    /// New tank at full health, facing up and aiming right
    pub fn new(id: u32, name: String, location: Vector2D) -> Self {
        Tank {
            id,
            name,
            location,
            orientation: Vector2D::UP,
            aim: Vector2D::RIGHT,
            hit_points: MAX_HIT_POINTS,
            score: 0,
            died: false,
            disconnected: false,
            joined: true,
            ammo: 0,
            move_request: MoveDirection::None,
            last_fire: None,
            died_at: None,
            pre_move_location: location,
        }
    }

    /// Marks the tank dead, keeping hp and the died flag in step
    pub fn kill(&mut self, now: Instant) {
        self.hit_points = 0;
        self.died = true;
        self.died_at = Some(now);
    }

    /// Removes one hit point; returns true if this hit killed the tank
    pub fn damage(&mut self, now: Instant) -> bool {
        self.hit_points = self.hit_points.saturating_sub(1);
        if self.hit_points == 0 {
            self.kill(now);
            true
        } else {
            false
        }
    }

    /// Brings a dead tank back at `location` with full health and no pending move
    pub fn revive(&mut self, location: Vector2D) {
        self.hit_points = MAX_HIT_POINTS;
        self.move_request = MoveDirection::None;
        self.died = false;
        self.died_at = None;
        self.location = location;
        self.pre_move_location = location;
    }

    pub fn to_record(&self) -> TankRecord {
        TankRecord {
            id: self.id,
            loc: self.location,
            bdir: self.orientation,
            tdir: self.aim,
            name: self.name.clone(),
            hp: self.hit_points,
            score: self.score,
            died: self.died,
            dc: self.disconnected,
            join: self.joined,
        }
    }
}

/// A main-fire shot travelling in a straight line
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u32,
    pub location: Vector2D,
    pub direction: Vector2D,
    pub owner: u32,
    pub died: bool,
}

impl Projectile {
    pub fn to_record(&self) -> ProjectileRecord {
        ProjectileRecord {
            id: self.id,
            loc: self.location,
            dir: self.direction,
            died: self.died,
            owner: self.owner,
        }
    }
}

/// Pickup granting one alt-fire charge
#[derive(Debug, Clone)]
pub struct PowerUp {
    pub id: u32,
    pub location: Vector2D,
    pub died: bool,
    pub died_at: Option<Instant>,
}

impl PowerUp {
    pub fn to_record(&self) -> PowerUpRecord {
        PowerUpRecord {
            id: self.id,
            loc: self.location,
            died: self.died,
        }
    }
}

/// Alt-fire ray, live for a short time after firing
#[derive(Debug, Clone)]
pub struct Beam {
    pub id: u32,
    pub origin: Vector2D,
    pub direction: Vector2D,
    pub owner: u32,
    pub created_at: Instant,
}

impl Beam {
    pub fn to_record(&self) -> BeamRecord {
        BeamRecord {
            id: self.id,
            org: self.origin,
            dir: self.direction,
            owner: self.owner,
        }
    }
}

/// Axis-aligned rectangle used to pick spawn points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Zone {
    pub fn contains(&self, point: Vector2D) -> bool {
        point.x >= self.x_min && point.x <= self.x_max && point.y >= self.y_min && point.y <= self.y_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tank_creation() {
        let tank = Tank::new(4, "ace".to_string(), Vector2D::new(10.0, 20.0));

        assert_eq!(tank.hit_points, MAX_HIT_POINTS);
        assert!(!tank.died);
        assert!(tank.joined);
        assert_eq!(tank.ammo, 0);
        assert_eq!(tank.move_request, MoveDirection::None);
        assert!(tank.last_fire.is_none());
    }

    #[test]
    fn test_damage_until_dead() {
        let now = Instant::now();
        let mut tank = Tank::new(1, "a".to_string(), Vector2D::ZERO);

        assert!(!tank.damage(now));
        assert!(!tank.damage(now));
        assert!(!tank.died);
        assert!(tank.damage(now));
        assert!(tank.died);
        assert_eq!(tank.hit_points, 0);
        assert_eq!(tank.died_at, Some(now));

        // Further damage never underflows.
        tank.damage(now);
        assert_eq!(tank.hit_points, 0);
    }

    #[test]
    fn test_revive_restores_hit_points() {
        let mut tank = Tank::new(1, "a".to_string(), Vector2D::ZERO);
        tank.kill(Instant::now());
        tank.revive(Vector2D::new(5.0, 5.0));

        assert!(!tank.died);
        assert_eq!(tank.hit_points, MAX_HIT_POINTS);
        assert_eq!(tank.location, Vector2D::new(5.0, 5.0));
        assert!(tank.died_at.is_none());
    }

    #[test]
    fn test_revive_clears_pending_move() {
        let mut tank = Tank::new(1, "a".to_string(), Vector2D::ZERO);
        tank.move_request = MoveDirection::Left;
        tank.kill(Instant::now());
        tank.revive(Vector2D::new(5.0, 5.0));

        assert_eq!(tank.move_request, MoveDirection::None);
    }

    #[test]
    fn test_record_reports_disconnect() {
        let mut tank = Tank::new(2, "b".to_string(), Vector2D::ZERO);
        tank.disconnected = true;
        tank.kill(Instant::now());

        let record = tank.to_record();
        assert!(record.dc);
        assert!(record.died);
        assert_eq!(record.hp, 0);
        assert_eq!(record.name, "b");
    }
}
