// src/main.rs

use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sovet::backend::{OpenAiClient, PerplexityClient};
use sovet::config::SovetConfig;
use sovet::pipeline::{ChatMessage, Pipeline, PipelineOutput};

/// Virtual board director: analyze an agenda document and print a cited
/// decision recommendation.
#[derive(Parser, Debug)]
#[command(name = "sovet", version)]
struct Args {
    /// Path to the agenda document; reads stdin when omitted.
    agenda: Option<std::path::PathBuf>,

    /// Print status events as JSON lines to stderr.
    #[arg(long)]
    json_events: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = SovetConfig::from_env();

    let agenda_text = match &args.agenda {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    info!("Starting agenda analysis (model: {})", config.completion_model);

    let openai = Arc::new(OpenAiClient::new(
        config.openai_base_url.clone(),
        config.completion_model.clone(),
    )?);
    let perplexity = Arc::new(PerplexityClient::new(
        config.perplexity_url.clone(),
        config.web_search_model.clone(),
        config.web_search_timeout,
    )?);

    let pipeline = Pipeline::new(
        config,
        openai.clone(),
        openai.clone(),
        perplexity,
        openai,
    );

    let messages = vec![ChatMessage {
        role: "user".to_string(),
        content: agenda_text,
    }];

    let (tx, mut rx) = mpsc::channel(32);
    let run = tokio::spawn(async move {
        pipeline.run(&messages, &tx).await;
    });

    while let Some(output) = rx.recv().await {
        match output {
            PipelineOutput::Status(event) => {
                if args.json_events {
                    eprintln!("{}", serde_json::to_string(&event)?);
                } else if !event.description().is_empty() {
                    info!("{}", event.description());
                }
            }
            PipelineOutput::Artifact(artifact) => println!("{artifact}"),
        }
    }

    run.await?;
    Ok(())
}
