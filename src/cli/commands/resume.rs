use anyhow::Result;

use super::{build_engine, print_outcome};
use post_pilot::config::PostPilotConfig;

pub struct ResumeCommand {
    config: PostPilotConfig,
    session_id: String,
    feedback: String,
}

impl ResumeCommand {
    pub fn new(config: PostPilotConfig, session_id: String, feedback: Vec<String>) -> Self {
        Self {
            config,
            session_id,
            feedback: feedback.join(" "),
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let engine = build_engine(&self.config)?;

        println!("💬 Sending feedback to session {}...", self.session_id);
        let outcome = engine.resume(&self.session_id, &self.feedback).await?;
        println!();
        print_outcome(&outcome);

        engine.log_metrics();
        Ok(())
    }
}
