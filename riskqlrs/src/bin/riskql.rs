use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use riskql::{training, RiskqlConfig, Runtime};

#[derive(Parser)]
#[command(name = "riskql")]
#[command(about = "Ask counterparty risk questions in plain English and get SQL back")]
#[command(version)]
struct Args {
    /// Config file (default: RISKQL_CONFIG, ./riskql.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web UI and JSON API
    Serve {
        /// Listen address, overriding server.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Generate SQL for a question, run it and print the outcome as JSON
    Ask {
        question: String,

        /// auto, custom, openai, local or rule
        #[arg(short, long)]
        generator: Option<String>,
    },
    /// Print the SQL for a question without running it
    Sql {
        question: String,

        #[arg(short, long)]
        generator: Option<String>,
    },
    /// Export the fine-tuning dataset built from the templates
    TrainingData {
        #[arg(short, long, default_value = "data")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("riskql=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => RiskqlConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RiskqlConfig::load_default(),
    };

    match args.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let runtime = Arc::new(Runtime::start(config).await?);
            riskql::server::serve(runtime, &bind).await?;
        }
        Commands::Ask {
            question,
            generator,
        } => {
            let runtime = Runtime::start(config).await?;
            let outcome = runtime.ask(&question, generator.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Sql {
            question,
            generator,
        } => {
            let runtime = Runtime::start(config).await?;
            let generation = runtime.generate(&question, generator.as_deref()).await?;
            eprintln!("-- {}", generation.generator_used);
            println!("{}", generation.generated.sql);
        }
        Commands::TrainingData { out } => {
            let runtime = Runtime::start(config).await?;
            let schema = runtime.database().extract_schema().await?;
            let summary = training::export(
                &out,
                runtime.catalog(),
                &schema,
                runtime.config().generation.prompt_columns,
            )?;
            println!(
                "wrote {} examples to {}",
                summary.examples,
                out.display()
            );
        }
    }
    Ok(())
}
