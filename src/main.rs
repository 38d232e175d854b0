use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retrace::browser::BrowserManager;
use retrace::converter;
use retrace::models::RawRecording;
use retrace::{EngineConfig, Workflow, WorkflowRunner};

#[derive(Parser)]
#[command(name = "retrace", about = "Convert and replay recorded browser workflows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a raw recording into a text-targeted workflow
    Convert {
        /// Path to the raw recording JSON
        recording: PathBuf,
        /// Output path; defaults to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a workflow against a live browser
    Run {
        /// Path to the workflow JSON
        workflow: PathBuf,
        /// Workflow inputs as key=value pairs
        #[arg(short, long, value_parser = parse_input)]
        input: Vec<(String, String)>,
        /// Launch the browser without a visible window
        #[arg(long)]
        headless: bool,
    },
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Convert { recording, output } => {
            let raw = std::fs::read_to_string(&recording)?;
            let recording: RawRecording = serde_json::from_str(&raw)?;
            let workflow = converter::convert(&recording);
            let json = serde_json::to_string_pretty(&workflow)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    tracing::info!(path = %path.display(), steps = workflow.steps.len(), "workflow written");
                }
                None => println!("{}", json),
            }
        }
        Command::Run {
            workflow,
            input,
            headless,
        } => {
            let workflow = Workflow::load_from_json(&workflow)?;
            let inputs: HashMap<String, Value> = input
                .into_iter()
                .map(|(k, v)| {
                    // Numeric and boolean literals keep their JSON type so
                    // schema validation sees what the user meant.
                    let value = serde_json::from_str(&v).unwrap_or(Value::String(v));
                    (k, value)
                })
                .collect();

            let config = EngineConfig::from_env();
            let manager = Arc::new(BrowserManager::new());
            manager.launch(headless).await?;

            let runner = WorkflowRunner::new(manager.clone(), config);
            let result = runner.run(&workflow, inputs).await;
            manager.close().await.ok();

            let result = result?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
