use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use concept_gen::{ConceptPipeline, FormSubmission, ImageFile, PipelineConfig, WidgetEvent};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Stage an image and run it through a concept generation webhook
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file (falls back to CONCEPT_GEN_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local image and generate a concept from it
    Generate {
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        prompt: String,
    },
    /// Resolve a CRM form submission, then generate
    Remote {
        #[arg(long)]
        contact_id: String,
        #[arg(long)]
        file_id: String,
        #[arg(short, long)]
        prompt: String,
    },
    /// Feed a raw inbound message, then generate if it staged an image
    Message {
        #[arg(long)]
        json: String,
        #[arg(short, long)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::from_env().context("Failed to load config from environment")?,
    };
    info!(webhook = %config.generation_webhook, format = ?config.format, "Pipeline configured");

    let pipeline = ConceptPipeline::new(config);
    let printer = tokio::spawn(print_events(pipeline.subscribe()));

    let outcome = run(&pipeline, args.command).await;

    // Closing the channel lets the printer drain and exit once any
    // background persistence has finished.
    drop(pipeline);
    if let Err(e) = printer.await {
        error!("Event printer failed: {}", e);
    }

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}

async fn run(pipeline: &ConceptPipeline, command: Command) -> Result<()> {
    let prompt = match command {
        Command::Generate { image, prompt } => {
            let file = ImageFile::from_path(&image);
            if !pipeline.select_local_file(file).await? {
                bail!("{} is not an image", image.display());
            }
            prompt
        }
        Command::Remote {
            contact_id,
            file_id,
            prompt,
        } => {
            pipeline
                .select_remote_image(&FormSubmission {
                    contact_id,
                    file_id,
                })
                .await?;
            prompt
        }
        Command::Message { json, prompt } => {
            let message: serde_json::Value =
                serde_json::from_str(&json).context("Message is not valid JSON")?;
            if !pipeline.handle_message(&message).await? {
                bail!("Message did not stage an image");
            }
            prompt
        }
    };

    let result = pipeline.generate(&prompt).await?;
    info!(url = %result.output_image_url, "Concept ready");
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<WidgetEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => error!("Failed to serialize event: {}", e),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Dropped {} widget events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
