use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "post-pilot")]
#[command(version)]
#[command(about = "Draft, review and publish LinkedIn posts with a language model")]
#[command(long_about = "Post Pilot drafts a LinkedIn post from your request, optionally searching the web, \
                       then waits for your feedback. Reply 'approve' to publish or describe what to change. \
                       Sessions are saved to disk, so a review can be resumed at any time.")]
pub struct Cli {
    /// Read configuration from this TOML file instead of post-pilot.toml
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long, global = true, help = "Emit structured JSON logs")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new session and print the first draft
    Start {
        /// Session id to use (a random one is generated otherwise)
        #[arg(long, help = "Session id (1-128 characters from A-Z, a-z, 0-9, '-' and '_')")]
        session: Option<String>,
        /// What the post should be about
        #[arg(required = true, help = "The post request, e.g. write a post about AI trends")]
        request: Vec<String>,
    },
    /// Answer a draft: 'approve' publishes it, anything else asks for a revision
    Resume {
        /// Session to resume
        session: String,
        /// Feedback text (empty asks for a generic revision)
        #[arg(help = "Feedback for the current draft, or approve/yes/ok/good/accept")]
        feedback: Vec<String>,
    },
    /// Re-run a step that failed (e.g. the model API was unreachable)
    Retry {
        /// Session to retry
        session: String,
    },
    /// Show the stored state of a session
    Show {
        /// Session to show
        session: String,
        /// Print the full session record as JSON
        #[arg(long, help = "Print the raw session record as JSON")]
        json: bool,
    },
    /// List stored sessions
    Sessions,
    /// Start a session and review drafts from standard input until it finishes
    Interactive {
        /// Session id to use (a random one is generated otherwise)
        #[arg(long)]
        session: Option<String>,
        /// What the post should be about
        #[arg(required = true)]
        request: Vec<String>,
    },
}
