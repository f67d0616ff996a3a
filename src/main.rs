use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use structopt::StructOpt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use wagon_playback::core::VehicleId;
use wagon_playback::gauge::SpeedGauge;
use wagon_playback::playback::ControlWarning;
use wagon_playback::renderer::TracingRenderer;
use wagon_playback::stats::{aggregate_daily, format_table};
use wagon_playback::{
    FileTrackSource, PlaybackController, PlaybackEvent, PlaybackPhase, PlaybackSettings, TrackSource,
};

/// Gauge frames drawn between two ticks
const FRAMES_PER_TICK: usize = 30;

#[derive(StructOpt)]
#[structopt(name = "wagon-playback", about = "Replay a recorded wagon GPS track")]
struct Args {
    /// CSV or JSON export of track points
    file: String,
    /// Vehicle to replay; the first one in the file when omitted
    #[structopt(long)]
    device: Option<String>,
    /// Play at the slow speed
    #[structopt(long)]
    slow: bool,
    /// How many times to press "fast"
    #[structopt(long, default_value = "0")]
    fast: u32,
    /// Print the daily summary without playing
    #[structopt(long)]
    stats_only: bool,
    /// Settings file to use instead of the one in the config directory
    #[structopt(long)]
    settings: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::from_args();
    let settings = match &args.settings {
        Some(path) => PlaybackSettings::load_from(Path::new(path))?,
        None => PlaybackSettings::load(),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    runtime.block_on(run(args, settings))
}

/// Factor after optionally pressing "slow" and then "fast" `presses` times
fn speed_factor(settings: &PlaybackSettings, slow: bool, presses: u32) -> f64 {
    let base = if slow { settings.slow_factor } else { 1.0 };
    // Presses beyond the floor change nothing
    base * 0.5f64.powi(presses.min(16) as i32)
}

async fn run(args: Args, settings: PlaybackSettings) -> Result<()> {
    let source = FileTrackSource::open(&args.file).with_context(|| format!("Failed to load {}", args.file))?;
    let range = source.full_range().context("The file has no track points")?;

    let device = match args.device {
        Some(id) => VehicleId::new(id),
        None => source
            .device_ids(range)
            .await?
            .into_iter()
            .next()
            .context("The file has no devices")?,
    };

    if args.stats_only {
        let points = source.track_points(&device, range).await?;
        print!("{}", format_table(&aggregate_daily(&points)));
        return Ok(());
    }

    let factor = speed_factor(&settings, args.slow, args.fast);

    let controller =
        PlaybackController::spawn(TracingRenderer::new(), settings).with_source(Arc::new(source), range);
    let mut events = controller.subscribe();

    controller.select_device(device.clone()).await?;
    let status = controller.set_speed(factor).await?;
    info!(
        "Replaying {} at factor {} ({}ms per point)",
        device,
        status.speed_factor,
        status.tick_interval.as_millis()
    );
    controller.play().await?;

    let mut gauge = SpeedGauge::new();
    let mut daily = Vec::new();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = &mut interrupt => {
                info!("Interrupted");
                break;
            }
        };

        match event {
            Ok(PlaybackEvent::CursorAdvanced { cursor, vehicle_speed }) => {
                gauge.set_target(vehicle_speed);
                for _ in 0..FRAMES_PER_TICK {
                    gauge.frame();
                }
                debug!("Point {}: gauge {} km/h ({:?})", cursor, gauge.reading(), gauge.band());
            }
            Ok(PlaybackEvent::DailyStats(rows)) => daily = rows,
            Ok(PlaybackEvent::PhaseChanged(PlaybackPhase::Finished)) => break,
            Ok(PlaybackEvent::Warning(warning)) => {
                warn!("{}", warning);
                if matches!(warning, ControlWarning::NothingToPlay | ControlWarning::SourceFailed(_)) {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => warn!("Skipped {} playback events", missed),
            Err(RecvError::Closed) => break,
        }
    }

    let status = controller.status().await?;
    info!("Played {}/{} points of {}", status.cursor, status.len, device);
    controller.shutdown().await?;

    print!("{}", format_table(&daily));
    Ok(())
}
