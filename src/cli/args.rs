//! Command-line argument parsing for agentic-rag
//!
//! Provides clap-based CLI with subcommands and verbosity control.
//! Flags override values loaded from the settings file.

use crate::config::Settings;
use crate::telemetry::Verbosity;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// agentic-rag - Plan, retrieve, reflect and answer
#[derive(Parser, Debug)]
#[command(name = "agentic-rag")]
#[command(version)]
#[command(about = "Answer questions with classification, decomposition and self-reflective retrieval", long_about = None)]
pub struct Args {
    /// Question to answer (same as `ask`)
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Ollama host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Ollama port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Ollama model to use
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// HTTP search endpoint
    #[arg(long, global = true, conflicts_with = "corpus")]
    pub search_url: Option<String>,

    /// Local JSON corpus for the in-memory index
    #[arg(long, global = true)]
    pub corpus: Option<PathBuf>,

    /// Maximum retrieval rounds per task
    #[arg(long, global = true)]
    pub max_rounds: Option<u32>,

    /// Quality threshold in [0, 1]
    #[arg(long, global = true)]
    pub quality_threshold: Option<f64>,

    /// Never split the query into sub-tasks
    #[arg(long, global = true)]
    pub no_decompose: bool,

    /// Accept the first draft without evaluation
    #[arg(long, global = true)]
    pub no_reflection: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress everything except the result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Answer a question
    Ask {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Classify a question without answering it
    Classify {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Show the retrieval parameters for a query type, round by round
    Plan {
        /// factual, conceptual, procedural, comparative, analytical, multi_hop, ambiguous
        #[arg(value_name = "TYPE")]
        query_type: String,

        /// Rounds to show
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },

    /// Display current configuration
    Config,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// Resolved subcommand; a bare query means `ask`
    pub fn resolve(&self) -> Result<Commands, String> {
        match (&self.command, &self.query) {
            (Some(_), Some(_)) => Err("Cannot specify a query with a subcommand.".to_string()),
            (Some(command), None) => Ok(command.clone()),
            (None, Some(query)) => Ok(Commands::Ask {
                query: query.clone(),
            }),
            (None, None) => Err(
                "Query required. Use 'agentic-rag <QUERY>' or run a subcommand.".to_string(),
            ),
        }
    }

    /// Apply command-line overrides on top of loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.ollama.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.ollama.port = port;
        }
        if let Some(model) = &self.model {
            settings.ollama.model = model.clone();
        }
        if let Some(url) = &self.search_url {
            settings.search.endpoint = Some(url.clone());
            settings.search.corpus = None;
        }
        if let Some(corpus) = &self.corpus {
            settings.search.corpus = Some(corpus.clone());
            settings.search.endpoint = None;
        }
        if let Some(rounds) = self.max_rounds {
            settings.agent.max_retrieval_rounds = rounds;
        }
        if let Some(threshold) = self.quality_threshold {
            settings.agent.quality_threshold = threshold;
        }
        if self.no_decompose {
            settings.agent.enable_task_decomposition = false;
        }
        if self.no_reflection {
            settings.agent.enable_self_reflection = false;
        }
    }
}
