use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iotflow_core::EditorConfig;
use iotflow_monitoring::{init_logging, MonitoringConfig};

/// Inspect and repair stored IoTFlow workflow payloads
#[derive(Parser, Debug)]
#[command(name = "iotflow", version, about)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize nodes, edges and device-sensor links of a payload
    Inspect {
        /// Payload file
        file: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rewrite a payload in canonical form, dropping invalid edges
    Normalize {
        /// Payload file
        input: PathBuf,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the device-sensor links implied by a payload's edges
    Links {
        /// Payload file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EditorConfig::load().context("Failed to load configuration")?;
    let monitoring = MonitoringConfig {
        enable_json_logging: cli.json_logs,
        ..MonitoringConfig::new("iotflow-cli", config.log_filter.clone())
    };
    init_logging(&monitoring).context("Failed to initialize logging")?;

    match cli.command {
        Command::Inspect { file, json } => {
            let payload = iotflow_cli::read_payload(&file)?;
            let report = iotflow_cli::inspect(&payload)
                .with_context(|| format!("Failed to decode {}", file.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Workflow: {}", report.name);
                for (kind, count) in &report.kinds {
                    println!("  {kind:<10} {count}");
                }
                println!("Unregistered sensors: {}", report.unregistered_sensors);
                println!("Valid edges: {}", report.valid_edges);
                if !report.dropped_edges.is_empty() {
                    println!("Dropped edges: {}", report.dropped_edges.join(", "));
                }
                println!("Device-sensor links: {}", report.links.len());
            }
        }
        Command::Normalize { input, out } => {
            let payload = iotflow_cli::read_payload(&input)?;
            let normalized = iotflow_cli::normalize(&payload)
                .with_context(|| format!("Failed to decode {}", input.display()))?;
            let rendered = serde_json::to_string_pretty(&normalized)?;

            match out {
                Some(path) => fs::write(&path, rendered)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
        Command::Links { file } => {
            let payload = iotflow_cli::read_payload(&file)?;
            let links = iotflow_cli::links(&payload)
                .with_context(|| format!("Failed to decode {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&links)?);
        }
    }

    Ok(())
}
