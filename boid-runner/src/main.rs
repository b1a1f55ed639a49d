use anyhow::{Context, Result};
use boid_runner::{load_settings, write_frame, FrameFormat, RunConfig, Runner};
use boid_shared::FlockSettings;
use clap::Parser;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless boid flock simulation", long_about = None)]
struct Args {
    /// Number of boids (overrides the settings file)
    #[arg(short, long)]
    count: Option<usize>,

    /// Viewport width
    #[arg(long, default_value_t = 800.0)]
    width: f32,

    /// Viewport height
    #[arg(long, default_value_t = 600.0)]
    height: f32,

    /// Number of ticks to simulate
    #[arg(short, long, default_value_t = 1000)]
    ticks: u64,

    /// Seed for a reproducible run
    #[arg(short, long)]
    seed: Option<u64>,

    /// Make the first boid a predator
    #[arg(short, long)]
    predator: bool,

    /// JSON settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit a frame every N ticks
    #[arg(short, long, default_value_t = 1)]
    every: u64,

    /// Emit per-boid snapshots instead of summaries
    #[arg(long)]
    snapshots: bool,

    /// Include position history in snapshots
    #[arg(long, requires = "snapshots")]
    trail: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)?,
            None => FlockSettings::default(),
        };
        if let Some(count) = self.count {
            settings.boid_count = count;
        }
        settings.predator |= self.predator;

        Ok(RunConfig {
            width: self.width,
            height: self.height,
            seed: self.seed,
            settings,
        })
    }

    fn format(&self) -> FrameFormat {
        if self.snapshots {
            FrameFormat::Snapshots { trail: self.trail }
        } else {
            FrameFormat::Summary
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = args.run_config()?;
    log::info!(
        "Simulating {} boids in {}x{} for {} ticks (predator: {}, seed: {:?})",
        config.settings.boid_count,
        config.width,
        config.height,
        args.ticks,
        config.settings.predator,
        config.seed
    );

    let mut runner = Runner::new(&config)?;
    let format = args.format();
    let every = args.every.max(1);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;
    let started = Instant::now();

    let ran = runner.run(args.ticks, |tick, flock| {
        if tick % every != 0 {
            return ControlFlow::Continue(());
        }
        match write_frame(&mut out, tick, flock, format) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                write_error = Some(e);
                ControlFlow::Break(())
            }
        }
    });

    if let Some(e) = write_error {
        return Err(e).context("Failed to write frame");
    }
    out.flush()?;

    let elapsed = started.elapsed().as_secs_f64();
    log::info!(
        "Ran {} ticks in {:.2}s ({:.1} ticks/s)",
        ran,
        elapsed,
        ran as f64 / elapsed.max(f64::EPSILON)
    );

    Ok(())
}
