#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use boid_core::{Boid, Flock, FlockParams, Vector2D};
use serde::{Deserialize, Serialize};

/// Represents a 2D position in screen coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Vector2D> for Position {
    fn from(v: Vector2D) -> Self {
        Self::new(v.x, v.y)
    }
}

/// Everything a renderer needs to draw one boid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoidSnapshot {
    pub position: Position,
    /// Radians, `atan2(dy, dx)`
    pub heading: f32,
    pub is_predator: bool,
    /// Oldest first; empty unless a trail was requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trail: Vec<Position>,
}

impl BoidSnapshot {
    pub fn from_boid(boid: &Boid, with_trail: bool) -> Self {
        let trail = if with_trail {
            boid.history().map(|p| Position::from(*p)).collect()
        } else {
            Vec::new()
        };

        Self {
            position: boid.position.into(),
            heading: boid.heading(),
            is_predator: boid.is_predator,
            trail,
        }
    }

    pub fn from_flock(flock: &Flock, with_trail: bool) -> Vec<Self> {
        flock
            .boids()
            .iter()
            .map(|boid| Self::from_boid(boid, with_trail))
            .collect()
    }
}

/// The user-adjustable subset of the simulation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlockSettings {
    pub speed_limit: f32,
    pub visual_range: f32,
    pub velocity_factor: f32,
    pub avoid_factor: f32,
    pub centering_factor: f32,
    pub boid_count: usize,
    pub predator: bool,
}

impl Default for FlockSettings {
    fn default() -> Self {
        let params = FlockParams::default();
        Self {
            speed_limit: params.speed_limit,
            visual_range: params.visual_range,
            velocity_factor: params.velocity_factor,
            avoid_factor: params.avoid_factor,
            centering_factor: params.centering_factor,
            boid_count: 100,
            predator: false,
        }
    }
}

impl FlockSettings {
    /// Copies the adjustable values onto `params`; the rest stay untouched
    pub fn apply(&self, params: &mut FlockParams) {
        params.speed_limit = self.speed_limit;
        params.visual_range = self.visual_range;
        params.velocity_factor = self.velocity_factor;
        params.avoid_factor = self.avoid_factor;
        params.centering_factor = self.centering_factor;
    }

    /// Count and predator changes can only take effect through a fresh flock
    pub fn requires_reinitialize(&self, flock: &Flock) -> bool {
        self.boid_count != flock.len() || self.predator != flock.predator().is_some()
    }

    /// Applies these settings to a running simulation, all or nothing.
    ///
    /// When a fresh flock is needed, `spawn(boid_count, predator)` builds it
    /// first; if that fails neither `flock` nor `params` is touched. Returns
    /// whether the flock was replaced.
    pub fn commit<E, F>(&self, flock: &mut Flock, params: &mut FlockParams, spawn: F) -> Result<bool, E>
    where
        F: FnOnce(usize, bool) -> Result<Flock, E>,
    {
        let respawned = if self.requires_reinitialize(flock) {
            Some(spawn(self.boid_count, self.predator)?)
        } else {
            None
        };

        self.apply(params);
        match respawned {
            Some(fresh) => {
                *flock = fresh;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Settings update message sent by a configuration surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub settings: FlockSettings,
}

#[cfg(feature = "std")]
impl SettingsUpdate {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Per-frame status of a running simulation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSummary {
    pub tick: u64,
    pub boid_count: usize,
    pub mean_speed: f32,
    pub predator: Option<Position>,
}

impl FrameSummary {
    pub fn from_flock(tick: u64, flock: &Flock) -> Self {
        let total: f32 = flock.boids().iter().map(Boid::speed).sum();
        Self {
            tick,
            boid_count: flock.len(),
            mean_speed: total / flock.len() as f32,
            predator: flock.predator().map(|boid| boid.position.into()),
        }
    }
}
