use anyhow::{bail, Result};

use super::session_store;
use post_pilot::config::PostPilotConfig;
use post_pilot::workflows::{Role, SessionStore};

pub struct ShowCommand {
    config: PostPilotConfig,
    session_id: String,
    json: bool,
}

impl ShowCommand {
    pub fn new(config: PostPilotConfig, session_id: String) -> Self {
        Self {
            config,
            session_id,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute(&self) -> Result<()> {
        let store = session_store(&self.config);
        let Some(record) = store.get(&self.session_id).await? else {
            bail!("Session {} not found", self.session_id);
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
            return Ok(());
        }

        println!("👀 Session {}", record.session_id);
        println!("   📍 Stage: {}", record.stage);
        println!("   🔁 Revisions: {}", record.state.revision_count);
        println!("   🕐 Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("   🕐 Updated: {}", record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        if let Some(outcome) = &record.publish_outcome {
            println!("   📤 Publish result: {}", outcome.message_text());
        }
        println!();

        println!("💬 Conversation ({} messages):", record.state.messages.len());
        for message in &record.state.messages {
            let label = match message.role {
                Role::System => "system",
                Role::Human => "human",
                Role::Assistant if !message.tool_calls.is_empty() => "assistant (tool calls)",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            println!("   [{label}] {}", preview(&message.content, 160));
        }

        if !record.state.draft_content.is_empty() {
            println!();
            println!("📝 Current draft:");
            println!("{}", record.state.draft_content);
        }
        Ok(())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() > max_chars {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        single_line
    }
}
