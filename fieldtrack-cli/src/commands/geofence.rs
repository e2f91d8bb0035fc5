//! Geofence management CLI commands.
//!
//! Operates on the persisted region list directly, so regions can be
//! authored while no session is running.

use clap::Subcommand;
use console::style;
use fieldtrack::GeofenceRegion;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Geofence action subcommands.
#[derive(Debug, Subcommand)]
pub enum GeofenceAction {
    /// List stored geofences with their membership state
    List,
    /// Add a geofence, replacing any geofence with the same id
    Add {
        /// Unique region id
        #[arg(long)]
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Center latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Center longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Radius in meters
        #[arg(long)]
        radius: f64,
        /// Store the region without evaluating it
        #[arg(long)]
        inactive: bool,
    },
    /// Remove a geofence and its membership state
    Remove {
        /// Region id
        id: String,
    },
}

/// Insert `region` or replace the region with the same id. Returns true if
/// an existing region was replaced.
pub fn upsert(regions: &mut Vec<GeofenceRegion>, region: GeofenceRegion) -> bool {
    match regions.iter_mut().find(|r| r.id() == region.id()) {
        Some(existing) => {
            *existing = region;
            true
        }
        None => {
            regions.push(region);
            false
        }
    }
}

/// Run a geofence subcommand.
pub fn run(runner: &CliRunner, action: GeofenceAction) -> Result<(), CliError> {
    runner.block_on(async move {
        let state = runner.open_state().await?;
        let mut regions = state.load_region_list().await?;

        match action {
            GeofenceAction::List => {
                if regions.is_empty() {
                    println!("No geofences defined.");
                    return Ok(());
                }
                println!(
                    "{:<16} {:<24} {:>11} {:>12} {:>9}  {}",
                    "ID", "NAME", "LAT", "LON", "RADIUS", "STATE"
                );
                for region in &regions {
                    let state_label = if !region.is_active() {
                        style("inactive").dim()
                    } else if state.load_membership(region.id()).await? {
                        style("inside").green()
                    } else {
                        style("outside").yellow()
                    };
                    println!(
                        "{:<16} {:<24} {:>11.6} {:>12.6} {:>7.0} m  {}",
                        region.id(),
                        region.name(),
                        region.latitude(),
                        region.longitude(),
                        region.radius(),
                        state_label
                    );
                }
                Ok(())
            }
            GeofenceAction::Add {
                id,
                name,
                lat,
                lon,
                radius,
                inactive,
            } => {
                let region = GeofenceRegion::new(id, name, lat, lon, radius)?.with_active(!inactive);
                let id = region.id().to_string();
                let replaced = upsert(&mut regions, region);
                state.save_region_list(&regions).await?;
                tracing::info!(region_id = %id, replaced, "Geofence stored");
                println!("{} geofence '{}'", if replaced { "Updated" } else { "Added" }, id);
                Ok(())
            }
            GeofenceAction::Remove { id } => {
                let before = regions.len();
                regions.retain(|r| r.id() != id);
                if regions.len() == before {
                    return Err(CliError::UnknownGeofence(id));
                }
                state.save_region_list(&regions).await?;
                state.remove_membership(&id).await?;
                tracing::info!(region_id = %id, "Geofence removed");
                println!("Removed geofence '{}'", id);
                Ok(())
            }
        }
    })
}
