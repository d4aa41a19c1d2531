use anyhow::Result;

use super::{build_engine, print_outcome};
use post_pilot::config::PostPilotConfig;

pub struct RetryCommand {
    config: PostPilotConfig,
    session_id: String,
}

impl RetryCommand {
    pub fn new(config: PostPilotConfig, session_id: String) -> Self {
        Self { config, session_id }
    }

    pub async fn execute(&self) -> Result<()> {
        let engine = build_engine(&self.config)?;

        println!("🔧 Retrying the pending step of session {}...", self.session_id);
        let outcome = engine.retry(&self.session_id).await?;
        println!();
        print_outcome(&outcome);

        engine.log_metrics();
        Ok(())
    }
}
