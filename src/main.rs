//! agentic-rag - Main CLI Entry Point

use agentic_rag::{
    cli::{output, Args, Commands},
    config::Settings,
    llm::{CompletionProvider, OllamaCompletion},
    planning::{QueryClassifier, RetrievalPlanner},
    search::{HttpSearchClient, InMemoryIndex, SearchProvider},
    telemetry::{init_tracing, Verbosity},
    AgenticOrchestrator, QueryType,
};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    args.apply(&mut settings);
    settings.validate()?;

    init_tracing(verbosity, &settings.logging.level);

    let command = args.resolve().map_err(|e| anyhow!(e))?;

    match command {
        Commands::Config => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print!("{}", output::render_settings(&settings));
            }
            Ok(())
        }
        Commands::Plan { query_type, rounds } => run_plan(&args, &settings, &query_type, rounds),
        Commands::Classify { query } => run_classify(&args, &settings, verbosity, &query).await,
        Commands::Ask { query } => run_ask(&args, &settings, verbosity, &query).await,
    }
}

fn run_plan(args: &Args, settings: &Settings, label: &str, rounds: u32) -> Result<()> {
    let query_type = QueryType::parse(label).ok_or_else(|| anyhow!("Unknown query type: {}", label))?;
    if rounds == 0 {
        return Err(anyhow!("--rounds must be at least 1"));
    }

    let planner = RetrievalPlanner::new(settings.engine.planner.clone());
    let plan: Vec<_> = (1..=rounds)
        .map(|round| planner.plan_round(query_type, round, rounds))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", output::render_plan(&plan));
    }
    Ok(())
}

async fn run_classify(args: &Args, settings: &Settings, verbosity: Verbosity, query: &str) -> Result<()> {
    let completion = completion_provider(settings).await?;
    let classifier = QueryClassifier::new(completion, settings.engine.classifier.clone());

    let spinner = spinner(verbosity, "Classifying...");
    let classification = classifier.classify_text(query).await;
    spinner.finish_and_clear();
    let classification = classification?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
    } else {
        print!("{}", output::render_classification(&classification));
    }
    Ok(())
}

async fn run_ask(args: &Args, settings: &Settings, verbosity: Verbosity, query: &str) -> Result<()> {
    let completion = completion_provider(settings).await?;
    let search = search_provider(settings)?;
    let orchestrator = AgenticOrchestrator::with_engine_config(completion, search, settings.engine.clone())?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let spinner = spinner(verbosity, "Thinking...");
    let answer = orchestrator
        .answer_with_cancel(query, &settings.agent, cancel)
        .await;
    spinner.finish_and_clear();
    let answer = answer?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", output::render_answer(&answer, verbosity.show_trace()));
        if !answer.is_authoritative() && verbosity != Verbosity::Quiet {
            eprintln!("{}", format!("Answer status: {}", answer.status.label()).yellow());
        }
    }
    Ok(())
}

async fn completion_provider(settings: &Settings) -> Result<Arc<dyn CompletionProvider>> {
    let client = OllamaCompletion::with_config(
        &settings.ollama_url(),
        &settings.ollama.model,
        Duration::from_secs(settings.ollama.timeout_secs),
    )?;

    if !client.health_check().await.unwrap_or(false) {
        return Err(anyhow!(
            "Ollama is not reachable at {}. Start it with: ollama serve",
            settings.ollama_url()
        ));
    }

    info!(model = %settings.ollama.model, "using Ollama");
    Ok(Arc::new(client))
}

fn search_provider(settings: &Settings) -> Result<Arc<dyn SearchProvider>> {
    match (&settings.search.endpoint, &settings.search.corpus) {
        (Some(endpoint), _) => {
            let client = match settings.search.timeout_secs {
                Some(secs) => HttpSearchClient::with_timeout(endpoint, Duration::from_secs(secs))?,
                None => HttpSearchClient::new(endpoint)?,
            };
            Ok(Arc::new(client))
        }
        (None, Some(path)) => {
            let index = InMemoryIndex::from_json_file(path)?;
            if index.is_empty() {
                warn!(corpus = %path.display(), "corpus is empty");
            }
            info!(documents = index.len(), "loaded corpus");
            Ok(Arc::new(index))
        }
        (None, None) => Err(anyhow!(
            "No search backend configured. Pass --search-url or --corpus, or set [search] in {}",
            Settings::default_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the config file".to_string())
        )),
    }
}

fn spinner(verbosity: Verbosity, message: &str) -> ProgressBar {
    if !verbosity.show_progress() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
