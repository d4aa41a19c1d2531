use anyhow::Result;
use tracing::info;

use super::{build_engine, new_session_id, print_outcome};
use post_pilot::config::PostPilotConfig;

pub struct StartCommand {
    config: PostPilotConfig,
    session_id: Option<String>,
    request: String,
}

impl StartCommand {
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

        println!("🚀 Drafting a post for session {session_id}...");
        let outcome = engine.start(&session_id, &self.request).await?;
        println!();
        print_outcome(&outcome);

        info!(session_id = %session_id, "Start command finished");
        engine.log_metrics();
        Ok(())
    }
}
