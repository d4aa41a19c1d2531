use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{build_engine, new_session_id, print_outcome};
use post_pilot::config::PostPilotConfig;
use post_pilot::workflows::RunOutcome;

/// Review loop on standard input
pub struct InteractiveCommand {
    config: PostPilotConfig,
    session_id: Option<String>,
    request: String,
}

impl InteractiveCommand {
    pub fn new(config: PostPilotConfig, session_id: Option<String>, request: Vec<String>) -> Self {
        Self {
            config,
            session_id,
            request: request.join(" "),
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let engine = build_engine(&self.config)?;
        let session_id = self.session_id.clone().unwrap_or_else(new_session_id);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        println!("🚀 Drafting a post for session {session_id}...");
        let mut outcome = engine.start(&session_id, &self.request).await?;

        while let RunOutcome::Suspended { payload, .. } = &outcome {
            println!();
            println!("📝 Draft:");
            println!();
            println!("{}", payload.current_draft);
            println!();
            println!("💬 {}", payload.prompt);
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;

            let Some(input) = lines.next_line().await? else {
                println!();
                println!("💾 Session saved. Continue later with: post-pilot resume {session_id} <feedback>");
                return Ok(());
            };
            outcome = engine.resume(&session_id, &input).await?;
        }

        println!();
        print_outcome(&outcome);
        engine.log_metrics();
        Ok(())
    }
}
