//! Simulate command - replay a recorded track through a live engine.

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use fieldtrack::sampler::ReplayProvider;
use fieldtrack::{GeofenceEventType, TrackingEngine};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub track: PathBuf,
    pub worker: String,
    pub backend_url: Option<String>,
    pub speedup: f64,
    pub keep_session: bool,
}

/// Run the simulate command.
pub fn run(runner: &CliRunner, args: SimulateArgs) -> Result<(), CliError> {
    runner.log_startup("simulate");
    runner.block_on(async move {
        let provider = ReplayProvider::from_file(&args.track, args.speedup).await?;
        let backend = runner.backend(args.backend_url)?;
        let engine = runner
            .open_engine(provider.clone(), args.speedup, backend)
            .await?;

        println!("FieldTrack Simulation");
        println!("=====================");
        println!();
        println!("Track:     {} ({} fixes)", args.track.display(), provider.len());
        println!("Worker:    {}", args.worker);
        println!("Speedup:   {}x", args.speedup);
        println!("Geofences: {}", engine.get_geofences().len());
        println!();

        if !engine.start_tracking(&args.worker).await {
            return Err(CliError::PermissionDenied);
        }

        replay(&engine, &provider, args.keep_session).await
    })
}

/// Follow the replay until it finishes or Ctrl+C, then stop (or keep) the
/// session and print a summary.
pub async fn replay(
    engine: &TrackingEngine,
    provider: &ReplayProvider,
    keep_session: bool,
) -> Result<(), CliError> {
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    ctrlc::set_handler(move || shutdown_signal.cancel())
        .map_err(|e| CliError::Signal(e.to_string()))?;

    let progress = ProgressBar::new(provider.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40.cyan/blue}] {pos}/{len} fixes {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let printer = spawn_event_printer(engine, progress.clone());

    while !provider.is_finished() {
        tokio::select! {
            _ = shutdown.cancelled() => {
                progress.println("Received shutdown signal, stopping...");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                progress.set_position(provider.emitted() as u64);
                progress.set_message(format!("| {} buffered", engine.buffered_len()));
            }
        }
    }
    progress.set_position(provider.emitted() as u64);

    // Let the last fix reach the engine before stopping
    tokio::time::sleep(Duration::from_millis(200)).await;
    progress.finish_and_clear();

    let outcome = if keep_session {
        println!("Leaving session active; run `fieldtrack resume` to continue.");
        engine.flush().await
    } else {
        engine.stop_tracking().await
    };
    printer.abort();

    let snapshot = engine.metrics();
    println!();
    println!("Session Summary");
    println!("───────────────");
    println!(
        "  Samples:   {} accepted ({} watch, {} poll), {} filtered",
        snapshot.samples_total(),
        snapshot.watch_samples,
        snapshot.poll_samples,
        snapshot.samples_filtered
    );
    println!(
        "  Geofences: {} transitions, {} reported",
        snapshot.geofence_events, snapshot.events_reported
    );
    println!(
        "  Uploads:   {} sent, {} failed ({:.0}% success)",
        snapshot.uploads_succeeded,
        snapshot.uploads_failed,
        snapshot.upload_success_ratio() * 100.0
    );
    if let Some(error) = outcome.error {
        println!(
            "  {} {} samples kept for the next flush: {}",
            style("Warning:").yellow().bold(),
            outcome.retained,
            error
        );
    }
    Ok(())
}

fn spawn_event_printer(
    engine: &TrackingEngine,
    progress: ProgressBar,
) -> tokio::task::JoinHandle<()> {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let label = match event.event_type {
                        GeofenceEventType::Enter => style("ENTER").green().bold(),
                        GeofenceEventType::Exit => style("EXIT ").red().bold(),
                    };
                    progress.println(format!(
                        "{} {} ({}) at {:.5}, {:.5} [{:.0} m from center]",
                        label,
                        event.region_name,
                        event.region_id,
                        event.location.latitude,
                        event.location.longitude,
                        event.distance_m
                    ));
                }
                Err(RecvError::Lagged(missed)) => {
                    progress.println(format!("({} geofence events not shown)", missed));
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
