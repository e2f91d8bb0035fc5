//! Status command - show the persisted session and last known location.

use console::style;
use serde_json::json;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the status command.
pub fn run(runner: &CliRunner, as_json: bool) -> Result<(), CliError> {
    runner.block_on(async {
        let state = runner.open_state().await?;
        let (worker_id, is_tracking) = state.load_session_state().await?;
        let last_known = state.load_last_known_location().await?;
        let regions = state.load_region_list().await?;

        let mut inside = Vec::new();
        for region in &regions {
            if state.load_membership(region.id()).await? {
                inside.push(region.id().to_string());
            }
        }

        if as_json {
            let report = json!({
                "tracking": is_tracking,
                "workerId": worker_id,
                "lastKnownLocation": last_known,
                "geofences": regions.len(),
                "inside": inside,
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
            return Ok(());
        }

        println!("State: {}", runner.state_dir().display());
        println!();

        let session = match (&worker_id, is_tracking) {
            (Some(worker), true) => format!("{} (worker {})", style("tracking").green().bold(), worker),
            _ => style("not tracking").dim().to_string(),
        };
        println!("  Session:    {}", session);

        match &last_known {
            Some(sample) => {
                let age_secs = sample.age_ms(fieldtrack::geo::now_millis()) / 1000;
                println!(
                    "  Last fix:   {:.6}, {:.6} ±{:.0} m ({}s ago)",
                    sample.latitude, sample.longitude, sample.accuracy, age_secs
                );
                if let Some(level) = sample.battery_level {
                    println!("  Battery:    {}%", level);
                }
            }
            None => println!("  Last fix:   {}", style("none").dim()),
        }

        println!("  Geofences:  {}", regions.len());
        if !inside.is_empty() {
            println!("  Inside:     {}", inside.join(", "));
        }
        Ok(())
    })
}
