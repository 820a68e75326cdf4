use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use avatar_retarget::config::Config;
use avatar_retarget::pipeline::FrameDriver;
use avatar_retarget::pose::{Landmarker, ReplayBackend};
use avatar_retarget::rig::JsonLinesSink;

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    // stdout はポーズ出力専用
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = Config::load_or_default(CONFIG_PATH);
    config.validate().context("invalid configuration")?;

    info!(
        scale = config.retarget.scale,
        alpha = config.retarget.smoothing_alpha,
        space = ?config.retarget.coordinate_space,
        legs = config.retarget.enable_legs,
        "Retarget settings"
    );

    let mut landmarker =
        Landmarker::<ReplayBackend<BufReader<File>>>::new(config.detector.clone());
    if !landmarker.initialize() {
        bail!("Landmarker could not be opened, check [detector] replay_path");
    }

    let sink = JsonLinesSink::new(io::stdout());
    let mut driver = FrameDriver::new(&config.retarget, landmarker, sink);

    let frame_duration = Duration::from_secs_f64(1.0 / config.app.target_fps as f64);
    let start = Instant::now();
    let mut fps_timer = Instant::now();
    let mut fps_counter = 0u32;

    while !driver.is_finished() {
        let frame_start = Instant::now();
        driver.tick(start.elapsed());

        fps_counter += 1;
        if fps_timer.elapsed() >= Duration::from_secs(1) {
            info!(
                fps = fps_counter,
                frames = driver.frames(),
                tracked = driver.tracked_frames(),
                written = driver.sink().written(),
                "[fps]"
            );
            fps_counter = 0;
            fps_timer = Instant::now();
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    driver.close();
    info!(
        frames = driver.frames(),
        tracked = driver.tracked_frames(),
        failures = driver.sink().failures(),
        "Replay finished"
    );
    Ok(())
}
