//! Binary entrypoint for the circular gallery.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use circular_gallery::config::Configuration;
use circular_gallery::events::{LoadImage, LoaderEvent};
use circular_gallery::gallery::simulate::{SimulationOptions, simulate};
use circular_gallery::gallery::{CarouselEngine, ScreenSize};
use circular_gallery::label::mount_entries;
use circular_gallery::tasks;

#[derive(Debug, Parser)]
#[command(name = "circular-gallery", version, about = "Infinite circular image carousel")]
struct Cli {
    /// Path to YAML config; defaults apply when omitted
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Run the engine headlessly for N frames, print the layout and exit
    #[arg(long = "simulate-frames", value_name = "N")]
    simulate_frames: Option<u64>,

    /// Screen size used by the simulation
    #[arg(long, value_name = "WxH", default_value = "1280x720", value_parser = parse_screen)]
    screen: ScreenSize,

    /// Wheel deltaY injected before the first simulated frame
    #[arg(long, value_name = "DELTA", allow_hyphen_values = true)]
    wheel: Option<f32>,

    /// Simulated time between frames
    #[arg(long = "frame-interval", value_name = "DURATION", default_value = "16ms", value_parser = humantime::parse_duration)]
    frame_interval: Duration,
}

fn parse_screen(raw: &str) -> Result<ScreenSize, String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {raw:?}"))?;
    let w = w.trim().parse::<u32>().map_err(|e| format!("bad width: {e}"))?;
    let h = h.trim().parse::<u32>().map_err(|e| format!("bad height: {e}"))?;
    Ok(ScreenSize::new(w, h))
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("circular_gallery={level}").parse()?)
        .add_directive("wgpu=warn".parse()?)
        .add_directive("winit=warn".parse()?);
    fmt().with_env_filter(filter).with_target(false).compact().init();
    Ok(())
}

fn load_configuration(path: Option<&PathBuf>) -> Result<Configuration> {
    let cfg = match path {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    cfg.validated().context("invalid configuration values")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = load_configuration(cli.config.as_ref())?;
    let items = cfg.effective_items()?;
    let entries = mount_entries(&items, &cfg.font, cfg.text_color.rgba());
    info!(entries = entries.len(), "gallery content resolved");

    if let Some(frames) = cli.simulate_frames {
        let mut engine = CarouselEngine::new(cfg.engine_settings(), entries, cli.screen);
        let options = SimulationOptions {
            frames,
            screen: cli.screen,
            wheel: cli.wheel,
            frame_interval: cli.frame_interval,
        };
        let report = simulate(&mut engine, &options);
        engine.teardown();
        print!("{report}");
        return Ok(());
    }

    let engine = CarouselEngine::new(cfg.engine_settings(), entries, cli.screen);
    let requests = engine.load_requests();

    let (to_load_tx, to_load_rx) = mpsc::channel::<LoadImage>(requests.len().max(1)); // Viewer -> Loader
    let (loaded_tx, loaded_rx) = crossbeam_channel::unbounded::<LoaderEvent>(); // Loader -> Viewer

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // Loader
    tasks.spawn({
        let cancel = cancel.clone();
        let loader_cfg = cfg.loader;
        async move {
            tasks::loader::run(to_load_rx, loaded_tx, cancel, loader_cfg)
                .await
                .context("loader task failed")
        }
    });

    for request in requests {
        if to_load_tx.send(LoadImage::from(request)).await.is_err() {
            tracing::warn!("loader stopped before all images were requested");
            break;
        }
    }
    drop(to_load_tx);

    // The viewer owns the main thread until the window closes or cancellation occurs
    if let Err(e) = tasks::viewer::run_windowed(engine, loaded_rx, cancel.clone(), cfg.clone())
        .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
