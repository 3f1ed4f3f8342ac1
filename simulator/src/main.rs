use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::{GuiBridge, DEFAULT_PORT};
use log::info;
use radarcore::device::{load_registers, JsonConfiguration};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::{App, WorkflowConfig};
use workflow::runner::{FrameReport, Report, Runner};

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthetic-scene driver for the radar processing apps")]
struct Args {
    /// Application to run; a workflow file overrides it
    #[arg(long, value_enum, default_value_t = App::Presence)]
    app: App,
    #[arg(long, default_value_t = 20)]
    frames: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Device, presence and segmentation settings in the sensor JSON format
    #[arg(long)]
    device_json: Option<PathBuf>,
    /// Register list to check and count, one `name address value` per line
    #[arg(long)]
    registers: Option<PathBuf>,
    /// Write the full run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    /// Keep the HTTP bridge alive for incoming scenarios
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn summary(report: &Report) -> String {
    let last = match report.frames.last() {
        Some(FrameReport::Presence(result)) => format!("state {:?}, distance {:.2} m", result.state, result.target_distance_m),
        Some(FrameReport::MotionAngle(result)) => format!(
            "distance {:.2} m, azimuth {:.1} deg, elevation {:.1} deg, speed {:.2} m/s",
            result.distance_m, result.azimuth_deg, result.elevation_deg, result.speed_m_s
        ),
        Some(FrameReport::Segmentation(result)) => format!(
            "segments {:?}, tracks {}",
            result.segments,
            result.tracks.iter().filter(|t| t.is_valid()).count()
        ),
        Some(FrameReport::Rdm { range_m, speed_m_s, magnitude_db }) => {
            format!("peak {:.2} m, {:.2} m/s, {:.1} dB", range_m, speed_m_s, magnitude_db)
        }
        Some(FrameReport::RangeAngle { range_m, angle_deg, magnitude }) => {
            format!("peak {:.2} m, {:.1} deg, magnitude {:.4}", range_m, angle_deg, magnitude)
        }
        None => "no output".to_string(),
    };
    format!(
        "{:?} run -> frames {}, detections {}, errors {}, last frame: {}",
        report.app, report.metrics.frames, report.metrics.detections, report.metrics.errors, last
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = args.workflow.as_ref() {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.app, args.frames, args.seed)
    };
    if let Some(path) = args.device_json.as_ref() {
        let json = JsonConfiguration::load(path).with_context(|| format!("loading {}", path.display()))?;
        workflow_config.apply_json(&json)?;
    }
    let registers = match args.registers.as_ref() {
        Some(path) => {
            let registers = load_registers(path).with_context(|| format!("loading {}", path.display()))?;
            info!("loaded {} registers from {}", registers.len(), path.display());
            registers.len()
        }
        None => 0,
    };

    let scenario = workflow_config.scenario.clone();
    let runner = Arc::new(Runner::new(workflow_config));
    let mut report = runner.execute(&scenario)?;
    report.registers = registers;
    println!("{}", summary(&report));

    if let Some(path) = args.report.as_ref() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&report).context("serializing report")?;
        fs::write(path, text).with_context(|| format!("writing report {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    if args.serve {
        let bridge = GuiBridge::new();
        bridge.publish(&report);
        bridge.serve(runner, args.port)?;
        println!("HTTP bridge running on 127.0.0.1:{} (Ctrl+C to stop)...", args.port);
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
