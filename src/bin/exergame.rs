use anyhow::{Context, Result};
use std::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use elder_exergame::camera::OpenCvCamera;
use elder_exergame::pose::OnnxKeypointSource;
use elder_exergame::render::MinifbRenderer;
use elder_exergame::{Config, Session};

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!(version = env!("GIT_VERSION"), "elder exergame");
    let config = Config::load_or_default(CONFIG_PATH);

    let camera = OpenCvCamera::open(&config.camera).context("camera")?;
    let (width, height) = camera.resolution();
    let detector = OnnxKeypointSource::load(&config.models, &config.pose)?;

    let (tx, mut rx) = mpsc::channel();
    let mut renderer = MinifbRenderer::new(
        "Elder Exergame",
        width as usize,
        height as usize,
        config.pose.confidence_floor,
        tx,
    )?;

    let mut session = Session::new(&config, camera, detector)?;
    let summary = session.run(&mut rx, &mut renderer)?;

    println!(
        "{} frames, {:.0} s, {} repetitions, {} wins, {} losses",
        summary.frames,
        summary.duration.as_secs_f32(),
        summary.stats.total_reps(),
        summary.stats.wins,
        summary.stats.losses
    );
    Ok(())
}
