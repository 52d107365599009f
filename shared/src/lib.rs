//! Wire protocol and gameplay constants shared by the arena server and its clients.
//!
//! Every message is a single line of UTF-8 text. The client opens with its
//! display name, then streams [`ControlCommand`] JSON objects; the server
//! answers with its handshake and then one snapshot per tick made of the
//! entity records defined here.

pub mod framing;

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

pub const TANK_SPEED: f64 = 3.0;
pub const PROJECTILE_SPEED: f64 = 30.0;
pub const TANK_SIZE: f64 = 60.0;
pub const WALL_SIZE: f64 = 50.0;
pub const MAX_HIT_POINTS: u8 = 3;
pub const MAX_AMMO: u8 = 2;
pub const BEAM_LIFETIME_MS: u64 = 200;
pub const DEFAULT_PORT: u16 = 11000;

/// A 2D vector in world coordinates. Positive `y` points down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };
    pub const UP: Vector2D = Vector2D { x: 0.0, y: -1.0 };
    pub const DOWN: Vector2D = Vector2D { x: 0.0, y: 1.0 };
    pub const LEFT: Vector2D = Vector2D { x: -1.0, y: 0.0 };
    pub const RIGHT: Vector2D = Vector2D { x: 1.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(&self, other: &Vector2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Returns the unit vector, or `None` for a zero-length (or non-finite) vector.
    pub fn normalized(&self) -> Option<Vector2D> {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            None
        } else {
            Some(Vector2D::new(self.x / len, self.y / len))
        }
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, rhs: Vector2D) -> Vector2D {
        Vector2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, rhs: Vector2D) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, rhs: Vector2D) -> Vector2D {
        Vector2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f64) -> Vector2D {
        Vector2D::new(self.x * scalar, self.y * scalar)
    }
}

/// Movement request carried by a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl MoveDirection {
    /// Unit direction of travel, `None` when the tank should hold still.
    pub fn unit(self) -> Option<Vector2D> {
        match self {
            MoveDirection::None => None,
            MoveDirection::Up => Some(Vector2D::UP),
            MoveDirection::Down => Some(Vector2D::DOWN),
            MoveDirection::Left => Some(Vector2D::LEFT),
            MoveDirection::Right => Some(Vector2D::RIGHT),
        }
    }
}

/// Weapon request carried by a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FireMode {
    #[default]
    None,
    Main,
    Alt,
}

/// One client input frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub moving: MoveDirection,
    pub fire: FireMode,
    pub tdir: Vector2D,
}

impl ControlCommand {
    pub fn new(moving: MoveDirection, fire: FireMode, tdir: Vector2D) -> Self {
        Self { moving, fire, tdir }
    }
}

/// Decodes a command frame. Anything that is not a well-formed command object
/// yields `None`; the caller drops it.
pub fn decode_command(frame: &str) -> Option<ControlCommand> {
    let frame = frame.trim();
    if !frame.starts_with('{') {
        return None;
    }
    serde_json::from_str(frame).ok()
}

/// Encodes a command as a newline-terminated frame.
pub fn encode_command(command: &ControlCommand) -> String {
    // Plain enums and finite floats cannot fail to serialize.
    let mut line = serde_json::to_string(command).unwrap_or_default();
    line.push('\n');
    line
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallRecord {
    #[serde(rename = "wall")]
    pub id: u32,
    pub p1: Vector2D,
    pub p2: Vector2D,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankRecord {
    #[serde(rename = "tank")]
    pub id: u32,
    pub loc: Vector2D,
    pub bdir: Vector2D,
    pub tdir: Vector2D,
    pub name: String,
    pub hp: u8,
    pub score: u32,
    pub died: bool,
    pub dc: bool,
    pub join: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileRecord {
    #[serde(rename = "proj")]
    pub id: u32,
    pub loc: Vector2D,
    pub dir: Vector2D,
    pub died: bool,
    pub owner: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpRecord {
    #[serde(rename = "power")]
    pub id: u32,
    pub loc: Vector2D,
    pub died: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamRecord {
    #[serde(rename = "beam")]
    pub id: u32,
    pub org: Vector2D,
    pub dir: Vector2D,
    pub owner: u32,
}

/// Any JSON line the server may send after the two handshake integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerRecord {
    Wall(WallRecord),
    Tank(TankRecord),
    Projectile(ProjectileRecord),
    PowerUp(PowerUpRecord),
    Beam(BeamRecord),
}

pub fn parse_record(line: &str) -> Option<ServerRecord> {
    serde_json::from_str(line.trim()).ok()
}
