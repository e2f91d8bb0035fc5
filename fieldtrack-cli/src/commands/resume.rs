//! Resume command - continue a session left active by an earlier run.

use std::path::PathBuf;

use fieldtrack::sampler::ReplayProvider;

use super::simulate::replay;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the resume command.
pub struct ResumeArgs {
    pub track: PathBuf,
    pub backend_url: Option<String>,
    pub speedup: f64,
}

/// Run the resume command.
pub fn run(runner: &CliRunner, args: ResumeArgs) -> Result<(), CliError> {
    runner.log_startup("resume");
    runner.block_on(async move {
        let provider = ReplayProvider::from_file(&args.track, args.speedup).await?;
        let backend = runner.backend(args.backend_url)?;
        let engine = runner
            .open_engine(provider.clone(), args.speedup, backend)
            .await?;

        if !engine.resume_tracking_if_active().await {
            println!("No active session to resume.");
            return Ok(());
        }

        let worker = engine
            .session()
            .map(|s| s.worker_id().to_string())
            .unwrap_or_default();
        println!("Resumed session for worker {}", worker);
        println!();

        replay(&engine, &provider, false).await
    })
}
