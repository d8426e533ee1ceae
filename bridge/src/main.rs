use anyhow::Context;
use clap::Parser;
use generator::seed::{demo_sightings, load_seed_file};
use generator::synthetic::{synthetic_sightings, SyntheticConfig};
use gui_bridge::bridge::GuiBridge;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use trashcore::pipeline::UploadStatus;
use workflow::config::BridgeConfig;
use workflow::runner::Runner;

mod clients;
mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Upload bridge and map-state server for trash sightings")]
struct Args {
    /// Load the bridge config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    detection_url: Option<String>,
    #[arg(long)]
    metadata_url: Option<String>,
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Use the synthetic detection backend and an in-memory metadata store
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Preload the bundled demo sightings
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
    /// Preload this many synthetic sightings
    #[arg(long, default_value_t = 0)]
    synthetic: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Submit one image through the pipeline and print the report
    #[arg(long)]
    upload: Option<PathBuf>,
    /// Keep the HTTP bridge alive for the visualizer
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    }
    .with_overrides(
        args.detection_url.clone(),
        args.metadata_url.clone(),
        args.bind,
    );

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating bridge runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: BridgeConfig) -> anyhow::Result<()> {
    let synthetic = SyntheticConfig {
        seed: args.seed,
        ..Default::default()
    };
    let runner = if args.offline {
        Runner::offline(&config, synthetic.clone())
    } else {
        Runner::connect(&config)?
    };

    if args.seed_demo {
        let loaded = runner.seed(demo_sightings());
        log::info!("loaded {} demo sightings", loaded);
    }
    if let Some(path) = &config.seed_file {
        let loaded = runner.seed(load_seed_file(path)?);
        log::info!("loaded {} sightings from {}", loaded, path.display());
    }
    if args.synthetic > 0 {
        runner.seed(synthetic_sightings(args.synthetic, &synthetic));
    }

    if let Some(path) = &args.upload {
        let report = runner.upload_file(path).await?;
        match &report.status {
            UploadStatus::Committed { id, outcome } => println!(
                "Upload {} -> {:?} {} ({})",
                report.ticket,
                outcome,
                id,
                report.session.prediction().unwrap_or_default()
            ),
            UploadStatus::Failed { message } => {
                println!("Upload {} failed: {}", report.ticket, message)
            }
            UploadStatus::Discarded => println!("Upload {} discarded", report.ticket),
        }
    }

    if args.serve {
        let gui_bridge = GuiBridge::new(runner.clone(), config.max_upload_bytes);
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        gui_bridge
            .serve(config.bind, async {
                if let Err(err) = signal::ctrl_c().await {
                    log::warn!("awaiting Ctrl+C failed: {}", err);
                }
            })
            .await?;
    } else {
        let model = runner.model();
        println!(
            "Map state -> records {}, markers {}, heat points {}",
            model.record_count,
            model.projections.markers.len(),
            model.projections.heatmap.len()
        );
    }

    Ok(())
}
