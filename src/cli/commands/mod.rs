use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

use post_pilot::config::PostPilotConfig;
use post_pilot::generation::ChatCompletionsGenerator;
use post_pilot::publish::LinkedInPublisher;
use post_pilot::telemetry::generate_correlation_id;
use post_pilot::tools::{SearchTool, ToolExecutor};
use post_pilot::workflows::{FileSystemSessionStore, RunOutcome, WorkflowEngine};

pub mod interactive;
pub mod resume;
pub mod retry;
pub mod sessions;
pub mod show;
pub mod start;

pub fn session_store(config: &PostPilotConfig) -> FileSystemSessionStore {
    FileSystemSessionStore::new(config.persistence.clone())
}

/// Wire the adapters named in `config` into an engine
pub fn build_engine(config: &PostPilotConfig) -> Result<WorkflowEngine> {
    let generator = ChatCompletionsGenerator::new(&config.generation)
        .context("Language model is not configured (set GROQ_API_KEY or generation.api_key)")?;
    let publisher = LinkedInPublisher::new(&config.linkedin)?;

    let mut tools = ToolExecutor::new();
    if config.search.enabled {
        match SearchTool::new(&config.search) {
            Ok(search) => tools.register(Arc::new(search)),
            Err(e) => warn!(error = %e, "Web search disabled"),
        }
    }

    Ok(WorkflowEngine::new(
        Arc::new(generator),
        Arc::new(publisher),
        Arc::new(session_store(config)),
    )
    .with_tools(tools)
    .with_config(config.workflow.clone()))
}

pub fn new_session_id() -> String {
    generate_correlation_id()
}

pub fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Suspended {
            session_id,
            payload,
        } => {
            println!("📝 Draft for session {session_id}:");
            println!();
            println!("{}", payload.current_draft);
            println!();
            println!("💬 {}", payload.prompt);
            println!("   post-pilot resume {session_id} approve");
            println!("   post-pilot resume {session_id} <your feedback>");
        }
        RunOutcome::Completed {
            session_id,
            final_message,
            outcome,
        } => {
            if outcome.is_published() {
                println!("✅ Session {session_id} published: {final_message}");
            } else {
                println!("❌ Session {session_id} finished but publishing failed: {final_message}");
            }
        }
        RunOutcome::Abandoned { session_id, reason } => {
            println!("🛑 Session {session_id} abandoned: {reason}");
            println!("   💡 Start a new session to try again");
        }
    }
}

pub async fn show_how_to_start() -> Result<()> {
    println!("✈️  Post Pilot - LinkedIn post drafting with human review");
    println!();
    println!("To get started:");
    println!("  🚀 post-pilot start write a post about AI trends");
    println!("  💬 post-pilot resume <session> make it shorter");
    println!("  ✅ post-pilot resume <session> approve");
    println!();
    println!("Other commands:");
    println!("  🔁 post-pilot interactive <request>   # Review drafts in the terminal");
    println!("  📋 post-pilot sessions                # List saved sessions");
    println!("  👀 post-pilot show <session>          # Inspect a session");
    println!("  🔧 post-pilot retry <session>         # Re-run a failed step");
    Ok(())
}
