// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::path::PathBuf;

use postflow::studio::collaborators::Collaborators;
use postflow::studio::{server, ConfigLoader, Engine, RunRequest, StreamingRun};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Port to listen on (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one request from the command line
    Run {
        #[arg(short, long)]
        user_id: String,

        /// What to publish
        #[arg(short, long)]
        request: String,

        /// Extra context as a JSON object, e.g. '{"image_count": 3}'
        #[arg(long)]
        context: Option<String>,

        /// Print every event as one JSON line
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = ConfigLoader::from_env(args.config.as_deref())?;
    let collaborators = Collaborators::from_config(&config)?;
    let engine = Engine::new(collaborators, &config)?;

    match args.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(&config.server, engine)
                .await
                .map_err(|e| anyhow::anyhow!("server failed: {}", e))?;
        }
        Commands::Run {
            user_id,
            request,
            context,
            stream,
        } => {
            let context: Map<String, Value> = match context {
                Some(raw) => serde_json::from_str(&raw).context("--context must be a JSON object")?,
                None => Map::new(),
            };
            let request = RunRequest {
                user_id,
                request,
                context,
            };

            if stream {
                let StreamingRun {
                    mut events,
                    outcome,
                } = engine.stream(request);
                while let Some(event) = events.next().await {
                    print!("{}", event.to_json_line());
                }
                let state = outcome.await.context("run task failed")?;
                log::info!("Run {} finished: {:?}", state.run_id(), state.status());
            } else {
                let state = engine.run(request).await;
                println!("{}", serde_json::to_string_pretty(&state.summary())?);
            }
        }
    }

    Ok(())
}
