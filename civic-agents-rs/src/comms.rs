// civic-agents-rs/src/comms.rs
// Citizen-facing confirmation messages for a submitted ticket.

use std::sync::Arc;

use llm_sdk::GenerativeBackend;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// SMS length the model is asked to respect; longer replies are cut
pub const SMS_MAX_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessages {
    pub sms: String,
    pub email: String,
    pub app_notification: String,
}

pub struct CommsAgent {
    backend: Arc<dyn GenerativeBackend>,
}

impl CommsAgent {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate_sms(&self, ticket: &Value) -> Result<String> {
        let prompt = format!(
            "Create a VERY short SMS-style message confirming a municipal incident \
             submission. Max {} characters. Info:\n{}",
            SMS_MAX_CHARS, ticket
        );
        let text = self.complete(&prompt).await?;
        Ok(text.chars().take(SMS_MAX_CHARS).collect::<String>().trim_end().to_string())
    }

    pub async fn generate_email(&self, ticket: &Value) -> Result<String> {
        let prompt = format!(
            "Write a polished, professional EMAIL confirming an incident report \
             submission to a city government. Include:\n\
             - Issue category\n- Location\n- Severity\n- Ticket ID\n- Expected next steps\n\n\
             Ticket data:\n{}",
            ticket
        );
        self.complete(&prompt).await
    }

    pub async fn generate_app_notification(&self, ticket: &Value) -> Result<String> {
        let prompt = format!(
            "Write a concise, friendly APP NOTIFICATION message acknowledging \
             an incident report submission. Keep it under 2 sentences.\n\nDetails:\n{}",
            ticket
        );
        self.complete(&prompt).await
    }

    /// One backend call per channel, in the order sms, email, app
    pub async fn generate_all_channels(&self, ticket: &Value) -> Result<ChannelMessages> {
        Ok(ChannelMessages {
            sms: self.generate_sms(ticket).await?,
            email: self.generate_email(ticket).await?,
            app_notification: self.generate_app_notification(ticket).await?,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let text = self.backend.generate_text(prompt, 0.0).await?;
        Ok(text.trim().to_string())
    }
}
