use anyhow::{Context, Result};
use boid_core::{Flock, FlockParams};
use boid_shared::{BoidSnapshot, FlockSettings, FrameSummary, SettingsUpdate};
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;

/// What a run starts from
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub width: f32,
    pub height: f32,
    /// Fixed seed for reproducible runs; `None` seeds from the OS
    pub seed: Option<u64>,
    pub settings: FlockSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            seed: None,
            settings: FlockSettings::default(),
        }
    }
}

/// Reads a settings file, either a bare `FlockSettings` object or a
/// `{"settings": ...}` update message
pub fn load_settings(path: &Path) -> Result<FlockSettings> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    parse_settings(&json).with_context(|| format!("Invalid settings in {}", path.display()))
}

pub fn parse_settings(json: &str) -> Result<FlockSettings> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.get("settings").is_some() {
        let update: SettingsUpdate = serde_json::from_value(value)?;
        return Ok(update.settings);
    }
    Ok(serde_json::from_value(value)?)
}

/// Owns a flock and drives it one tick at a time
pub struct Runner {
    flock: Flock,
    params: FlockParams,
    width: f32,
    height: f32,
    seed: Option<u64>,
    tick: u64,
}

impl Runner {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let flock = spawn_flock(config.width, config.height, config.seed, &config.settings)?;

        let mut params = FlockParams::default();
        config.settings.apply(&mut params);

        Ok(Self {
            flock,
            params,
            width: config.width,
            height: config.height,
            seed: config.seed,
            tick: 0,
        })
    }

    /// Drives an existing flock, e.g. one built with `Flock::from_boids`
    pub fn from_flock(flock: Flock, params: FlockParams, width: f32, height: f32) -> Self {
        Self {
            flock,
            params,
            width,
            height,
            seed: None,
            tick: 0,
        }
    }

    pub fn flock(&self) -> &Flock {
        &self.flock
    }

    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Takes effect on the next step; a new count or predator toggle respawns
    /// the flock. On error the runner is left exactly as it was.
    pub fn apply_settings(&mut self, settings: &FlockSettings) -> Result<()> {
        let (width, height, seed) = (self.width, self.height, self.seed);
        let respawned = settings.commit(&mut self.flock, &mut self.params, |count, predator| {
            let wanted = FlockSettings {
                boid_count: count,
                predator,
                ..settings.clone()
            };
            spawn_flock(width, height, seed, &wanted)
        })?;

        if respawned {
            log::info!(
                "Respawned flock with {} boids (predator: {})",
                settings.boid_count,
                settings.predator
            );
            self.tick = 0;
        }

        Ok(())
    }

    /// Only bounds avoidance sees the new viewport
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        log::debug!("Viewport resized to {}x{}", width, height);
    }

    pub fn step(&mut self) {
        self.flock.step(self.width, self.height, &self.params);
        self.tick += 1;
    }

    /// Steps up to `ticks` times, handing each frame to `on_frame`.
    /// Returns how many ticks actually ran.
    pub fn run<F>(&mut self, ticks: u64, mut on_frame: F) -> u64
    where
        F: FnMut(u64, &Flock) -> ControlFlow<()>,
    {
        let mut ran = 0;
        while ran < ticks {
            self.step();
            ran += 1;
            if on_frame(self.tick, &self.flock).is_break() {
                log::debug!("Run stopped early at tick {}", self.tick);
                break;
            }
        }
        ran
    }
}

fn spawn_flock(width: f32, height: f32, seed: Option<u64>, settings: &FlockSettings) -> Result<Flock> {
    let flock = match seed {
        Some(seed) => Flock::seeded(settings.boid_count, width, height, settings.predator, seed),
        None => Flock::random(settings.boid_count, width, height, settings.predator),
    };
    flock.context("Failed to initialize flock")
}

/// Output format of a frame line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Summary,
    Snapshots { trail: bool },
}

/// Writes one JSON line describing the flock
pub fn write_frame<W: Write>(out: &mut W, tick: u64, flock: &Flock, format: FrameFormat) -> Result<()> {
    match format {
        FrameFormat::Summary => serde_json::to_writer(&mut *out, &FrameSummary::from_flock(tick, flock))?,
        FrameFormat::Snapshots { trail } => {
            serde_json::to_writer(&mut *out, &BoidSnapshot::from_flock(flock, trail))?
        }
    }
    writeln!(out)?;
    Ok(())
}
