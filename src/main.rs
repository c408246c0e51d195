//! Seabed - headless streaming driver
//!
//! Usage: cargo run --release -- [CONFIG.json] [OPTIONS]
//!
//! Options:
//!   --frames <N>      Frames to simulate (default: 600)
//!   --speed <UNITS>   Distance travelled along +X per frame (default: 0.25)
//!   --save <PATH>     Write the effective config as JSON and continue

use std::path::{Path, PathBuf};
use std::time::Instant;

use glam::Vec3;

use seabed::core::logging;
use seabed::math::{HitTag, Raycaster};
use seabed::streaming::NullSink;
use seabed::verlet::{Collider, SphereCollider};
use seabed::{Result, World, WorldConfig};

/// Radius of the sphere standing in for the player's vehicle
const VEHICLE_RADIUS: f32 = 1.5;

fn main() {
    logging::init();
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let frames = parse_arg::<u32>(&args, "--frames").unwrap_or(600);
    let speed = parse_arg::<f32>(&args, "--speed").unwrap_or(0.25);

    let config = match config_path(&args) {
        Some(path) => WorldConfig::load(&path)?,
        None => WorldConfig::default(),
    };
    if let Some(path) = parse_arg::<PathBuf>(&args, "--save") {
        config.save(&path)?;
        log::info!("Saved config to {}", path.display());
    }

    let cruise_height = config.streaming.column_height * 0.4;
    let mut world = World::new(config)?;
    let mut sink = NullSink;

    let start = Instant::now();
    for frame in 0..frames {
        let position = Vec3::new(frame as f32 * speed, cruise_height, 0.0);
        let vehicle = SphereCollider::new(position, VEHICLE_RADIUS, HitTag::Player);
        let host: &dyn Raycaster = &vehicle;
        let collider: &dyn Collider = &vehicle;

        let report = world.update(position, Some(host), &mut sink);
        if !report.is_idle() {
            log::info!(
                "Frame {}: center {:?}, +{} -{} chunks, {} vegetated, {} cleared",
                frame,
                report.center,
                report.loaded.len(),
                report.unloaded.len(),
                report.vegetated.len(),
                report.cleared.len()
            );
        }
        world.fixed_update(&[collider]);
    }

    let stats = world.stats();
    log::info!(
        "Done: {} frames in {:.2?}, {} loaded / {} pooled / {} created chunks, {} vertices, {} plants, {} treasures",
        frames,
        start.elapsed(),
        stats.loaded_chunks,
        stats.pooled_chunks,
        stats.created_chunks,
        stats.vertices,
        stats.plants,
        stats.treasures
    );
    Ok(())
}

/// First positional argument that is not an option value
fn config_path(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
            continue;
        }
        return Some(Path::new(arg).to_path_buf());
    }
    None
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
