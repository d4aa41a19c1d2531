use anyhow::Result;

use super::session_store;
use post_pilot::config::PostPilotConfig;
use post_pilot::workflows::SessionStore;

pub struct SessionsCommand {
    config: PostPilotConfig,
}

impl SessionsCommand {
    pub fn new(config: PostPilotConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self) -> Result<()> {
        let store = session_store(&self.config);
        let ids = store.list_session_ids().await?;

        if ids.is_empty() {
            println!("📋 No saved sessions in {}", self.config.persistence.state_directory.display());
            println!("   💡 Start one with: post-pilot start <request>");
            return Ok(());
        }

        println!("📋 {} saved session(s):", ids.len());
        for id in ids {
            match store.get(&id).await {
                Ok(Some(record)) => println!(
                    "   {id}  {}  (updated {})",
                    record.stage,
                    record.updated_at.format("%Y-%m-%d %H:%M")
                ),
                Ok(None) => {}
                Err(e) => println!("   {id}  ⚠️  unreadable: {e}"),
            }
        }
        Ok(())
    }
}
