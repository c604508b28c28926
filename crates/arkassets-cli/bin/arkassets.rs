//! arkassets binary entry point.
//!
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Resolves the manifest and either lists packages or downloads them
//!
//! Version or manifest failures exit non-zero; individual file failures are
//! reported in the summary and do not change the exit status.

use anyhow::Result;
use arkassets_cli::CliConfig;
use arkassets_cli::logging;
use arkassets_cli::render::{ProgressView, package_table};
use arkassets_protocol::Pipeline;
use indicatif::{MultiProgress, ProgressDrawTarget};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliConfig::from_args();

    let multi = if cli.no_progress || cli.list {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    logging::init(&multi, cli.log_file.as_deref())?;

    // reqwest is built without a default TLS provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = cli.pipeline_config();
    tracing::info!(
        "arkassets {} starting: server={}, savedir={}, threads={}",
        env!("CARGO_PKG_VERSION"),
        config.server,
        config.save_dir.display(),
        config.lanes()
    );

    let pipeline = Pipeline::new(config)?;

    if cli.list {
        let (_, _, resolved) = pipeline.resolve().await?;
        for line in package_table(&resolved.manifest) {
            println!("{line}");
        }
        return Ok(());
    }

    let view = ProgressView::start(&multi, pipeline.progress());
    let result = pipeline.run().await;
    view.finish().await;

    let report = result?;
    if !report.is_success() {
        tracing::warn!(
            "{} of {} files failed, rerun to retry them",
            report.batch.failed.len(),
            report.batch.scheduled
        );
    }
    Ok(())
}
