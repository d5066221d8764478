//! crates/know_flow_client/src/chat.rs
//!
//! A headless conversation that turns learner prompts into learning plans.

use chrono::{DateTime, Utc};
use know_flow_core::domain::LearningContext;
use know_flow_core::protocol::PlanSummary;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set on assistant messages that report a failed request.
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_error,
        }
    }
}

pub struct StudyChat {
    client: ApiClient,
    user_id: String,
    context: LearningContext,
    messages: Vec<ChatMessage>,
    current_plan: Option<PlanSummary>,
    last_error: Option<String>,
}

impl StudyChat {
    pub fn new(client: ApiClient, user_id: impl Into<String>, context: LearningContext) -> Self {
        Self {
            client,
            user_id: user_id.into(),
            context,
            messages: Vec::new(),
            current_plan: None,
            last_error: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn current_plan(&self) -> Option<&PlanSummary> {
        self.current_plan.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn context(&self) -> &LearningContext {
        &self.context
    }

    pub fn set_context(&mut self, context: LearningContext) {
        self.context = context;
    }

    /// Sends `prompt` for plan generation and records both sides of the exchange.
    ///
    /// Blank prompts are ignored. Failures become a single assistant message with
    /// `is_error` set; the previous plan, if any, is kept.
    pub async fn send_prompt(&mut self, prompt: &str) -> Option<&PlanSummary> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        self.messages
            .push(ChatMessage::new(ChatRole::User, prompt, false));

        match self
            .client
            .generate_learning_plan(&self.user_id, prompt, &self.context)
            .await
        {
            Ok(plan) => {
                info!(plan_id = %plan.id, lessons = plan.lessons.len(), "Learning plan received");
                self.messages.push(ChatMessage::new(
                    ChatRole::Assistant,
                    describe_plan(&plan),
                    false,
                ));
                self.last_error = None;
                self.current_plan = Some(plan);
                self.current_plan.as_ref()
            }
            Err(e) => {
                error!("Plan generation failed: {}", e);
                let message = e.to_string();
                self.messages
                    .push(ChatMessage::new(ChatRole::Assistant, message.clone(), true));
                self.last_error = Some(message);
                None
            }
        }
    }

    /// Drops the conversation and any plan it produced.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.current_plan = None;
        self.last_error = None;
    }
}

fn describe_plan(plan: &PlanSummary) -> String {
    let mut text = format!(
        "I've created \"{}\" for you with {} lesson{}.",
        plan.title,
        plan.lessons.len(),
        if plan.lessons.len() == 1 { "" } else { "s" }
    );
    if !plan.estimated_duration.is_empty() {
        text.push_str(&format!(" Estimated duration: {}.", plan.estimated_duration));
    }
    if let Some(first) = plan.lessons.first() {
        text.push_str(&format!(" Start with \"{}\".", first.title));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use know_flow_core::protocol::LessonOutline;

    fn summary(lessons: &[&str]) -> PlanSummary {
        PlanSummary {
            id: "p1".into(),
            title: "Python Basics".into(),
            description: String::new(),
            lessons: lessons
                .iter()
                .map(|t| LessonOutline {
                    id: None,
                    title: t.to_string(),
                    objectives: vec![],
                    estimated_minutes: 0,
                    order: 0,
                })
                .collect(),
            estimated_duration: String::new(),
            difficulty: None,
            quality_score: None,
            topics: vec![],
        }
    }

    #[test]
    fn description_names_plan_and_first_lesson() {
        let text = describe_plan(&summary(&["Variables", "Loops"]));
        assert!(text.contains("Python Basics"));
        assert!(text.contains("2 lessons"));
        assert!(text.contains("Variables"));
        assert_eq!(describe_plan(&summary(&["Only"])).contains("1 lesson."), true);
    }

    #[tokio::test]
    async fn blank_prompt_sends_nothing() {
        let client = ApiClient::new(crate::config::ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let mut chat = StudyChat::new(client, "u1", LearningContext::default());
        assert!(chat.send_prompt("   ").await.is_none());
        assert!(chat.messages().is_empty());
    }
}
