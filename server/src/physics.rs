//! Discrete per-tick hit tests used by the world simulation.

use shared::{Vector2D, WallRecord, TANK_SIZE, WALL_SIZE};

/// Axis-aligned box covering a wall segment plus its padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallBounds {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl WallBounds {
    pub fn from_wall(wall: &WallRecord) -> Self {
        let pad = WALL_SIZE / 2.0;
        Self {
            left: wall.p1.x.min(wall.p2.x) - pad,
            right: wall.p1.x.max(wall.p2.x) + pad,
            top: wall.p1.y.min(wall.p2.y) - pad,
            bottom: wall.p1.y.max(wall.p2.y) + pad,
        }
    }

    /// Strict box overlap against a tank centred at `center`.
    pub fn overlaps_tank(&self, center: Vector2D) -> bool {
        let half = TANK_SIZE / 2.0;
        center.x - half < self.right
            && center.x + half > self.left
            && center.y - half < self.bottom
            && center.y + half > self.top
    }

    /// Inclusive point containment, used for projectiles.
    pub fn contains(&self, point: Vector2D) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }
}

/// Whether `point` lies inside the tank's bounding circle.
pub fn within_tank_radius(tank: Vector2D, point: Vector2D) -> bool {
    (point - tank).length() < TANK_SIZE / 2.0
}

/// Ray/circle intersection for a ray `origin + t * dir`.
///
/// With `a = D·D`, `b = 2(O-C)·D`, `c = (O-C)·(O-C) - r²`, a hit needs a
/// non-negative discriminant and both `-b ± √disc` strictly positive, i.e.
/// the circle lies entirely ahead of the origin. A circle that contains the
/// origin is a miss.
pub fn ray_hits_circle(origin: Vector2D, dir: Vector2D, center: Vector2D, radius: f64) -> bool {
    let offset = origin - center;
    let a = dir.dot(&dir);
    let b = 2.0 * offset.dot(&dir);
    let c = offset.dot(&offset) - radius * radius;

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return false;
    }

    // Only the signs matter, so the division by 2a is skipped.
    let root = disc.sqrt();
    -b + root > 0.0 && -b - root > 0.0
}

/// Toroidal wrap of one coordinate of a world spanning `[-half, half]`.
///
/// Crossing an edge re-enters from the opposite edge by the same overshoot.
/// Both edges are checked in turn, so `-half` is a fixed point.
pub fn wrap_coordinate(value: f64, half: f64) -> f64 {
    let size = half * 2.0;
    let mut value = value;
    if value <= -half {
        value += size;
    }
    if value >= half {
        value -= size;
    }
    value
}

/// Whether a point is on or beyond any edge of the world.
pub fn out_of_bounds(point: Vector2D, half: f64) -> bool {
    point.x <= -half || point.x >= half || point.y <= -half || point.y >= half
}
