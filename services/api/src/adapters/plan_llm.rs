//! services/api/src/adapters/plan_llm.rs
//!
//! This module contains the adapter for the plan-generation LLM.
//! It implements the `PlanGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use know_flow_core::domain::{Difficulty, GeneratedLesson, GeneratedPlan, MAX_LESSON_MINUTES};
use know_flow_core::knowledge::{ConceptRelation, GeneratedConcept, GeneratedRelation};
use know_flow_core::ports::{PlanGenerationService, PlanRequest, PortError, PortResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

const SYSTEM_INSTRUCTIONS: &str = r#"You are a curriculum designer. Given a learner's request, you write a structured learning plan.

Respond with ONE JSON object and nothing else, using exactly this shape:
{
  "title": "short title of the plan",
  "description": "two or three sentences on what the learner will achieve",
  "difficulty": "beginner | intermediate | advanced",
  "estimated_duration": "human readable total, e.g. '3 weeks' or '6 hours'",
  "topics": ["main topic", "..."],
  "quality_score": 0.0-1.0 self-assessment of how well the plan fits the request,
  "lessons": [
    {
      "title": "lesson title",
      "objectives": ["what the learner can do afterwards"],
      "content": "the lesson itself: explanations, examples and exercises",
      "external_resources": ["https://reliable.example/resource"],
      "estimated_minutes": 30,
      "difficulty": "beginner | intermediate | advanced"
    }
  ],
  "concepts": [
    {"name": "concept name", "description": "one sentence", "lesson": 1}
  ],
  "relationships": [
    {"source": "concept name", "target": "concept name", "type": "related_to | prerequisite_for | part_of"}
  ]
}

Rules:
- Order lessons so that each one builds on the previous ones.
- Size lessons to the learner's available minutes per day when given.
- Adapt explanations to the learner's style (visual, auditory, reading, kinesthetic, mixed).
- Only cite resources you are confident exist.
- "lesson" is the 1-based number of the lesson that teaches the concept.
- Keep concept relationships logical: a prerequisite must be taught before what it unlocks."#;

/// Bounds applied to generated plans.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_lessons: usize,
    pub max_resources_per_lesson: usize,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            max_lessons: 10,
            max_resources_per_lesson: 5,
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PlanGenerationService` using an OpenAI-compatible chat model.
#[derive(Clone)]
pub struct OpenAiPlanAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    limits: PlanLimits,
}

impl OpenAiPlanAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String, limits: PlanLimits) -> Self {
        Self {
            client,
            model,
            limits,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn user_message(request: &PlanRequest) -> String {
    let context = &request.context;
    let mut message = format!("Learner request: {}\n", request.prompt.trim());
    if let Some(style) = context.learning_style {
        message.push_str(&format!("Learning style: {}\n", style));
    }
    if let Some(difficulty) = context.difficulty {
        message.push_str(&format!("Level: {}\n", difficulty));
    }
    if let Some(minutes) = context.time_availability {
        message.push_str(&format!("Available time: {} minutes per day\n", minutes));
    }
    if let Some(goals) = context.goals.as_deref().filter(|g| !g.trim().is_empty()) {
        message.push_str(&format!("Goals: {}\n", goals.trim()));
    }
    message
}

/// Maps a provider failure onto the port's error taxonomy.
fn classify_llm_error(message: String) -> PortError {
    let lowered = message.to_lowercase();
    if lowered.contains("rate limit") || lowered.contains("rate_limit") || lowered.contains("429") {
        PortError::RateLimited(message)
    } else {
        PortError::Upstream(format!("AI service error: {}", message))
    }
}

//=========================================================================================
// Response parsing
//=========================================================================================

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default, alias = "plan_title")]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    estimated_duration: Option<Value>,
    #[serde(default)]
    topics: Vec<Value>,
    #[serde(default)]
    quality_score: Option<f64>,
    #[serde(default)]
    lessons: Vec<RawLesson>,
    #[serde(default)]
    concepts: Vec<RawConcept>,
    #[serde(default, alias = "edges")]
    relationships: Vec<RawRelation>,
}

#[derive(Deserialize)]
struct RawConcept {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    lesson: Option<Value>,
}

#[derive(Deserialize)]
struct RawRelation {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, rename = "type", alias = "relationship_type")]
    relation: Option<String>,
}

#[derive(Deserialize)]
struct RawLesson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    objectives: Vec<Value>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    external_resources: Vec<Value>,
    #[serde(default)]
    estimated_minutes: Option<Value>,
    #[serde(default)]
    difficulty: Option<String>,
}

const DEFAULT_LESSON_MINUTES: u32 = 30;
const DEFAULT_QUALITY_SCORE: f64 = 0.7;

/// Slices the JSON object out of a reply that may be wrapped in prose or code fences.
pub(crate) fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn strings(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accepts `30`, `30.0`, `"30"` and `"30 minutes"`, capped at one day.
fn minutes(value: Option<Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Some(Value::String(s)) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u64>().ok()
        }
        _ => None,
    };
    parsed
        .map(|m| m.min(MAX_LESSON_MINUTES as u64) as u32)
        .unwrap_or(DEFAULT_LESSON_MINUTES)
}

/// Maps a 1-based lesson number onto an index into the kept lessons.
fn lesson_index(value: Option<Value>, lessons: usize) -> Option<usize> {
    let number = match value? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let index = usize::try_from(number).ok()?.checked_sub(1)?;
    (index < lessons).then_some(index)
}

fn concepts(raw: Vec<RawConcept>, lessons: usize) -> Vec<GeneratedConcept> {
    raw.into_iter()
        .filter_map(|c| {
            let name = c.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
            Some(GeneratedConcept {
                name,
                description: c.description.unwrap_or_default().trim().to_string(),
                lesson: lesson_index(c.lesson, lessons),
            })
        })
        .collect()
}

fn relations(raw: Vec<RawRelation>) -> Vec<GeneratedRelation> {
    raw.into_iter()
        .filter_map(|r| {
            Some(GeneratedRelation {
                source: r.source?,
                target: r.target?,
                relation: r
                    .relation
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(ConceptRelation::RelatedTo),
            })
        })
        .collect()
}

/// Validates a raw model reply into a `GeneratedPlan`.
pub(crate) fn parse_generated_plan(
    reply: &str,
    fallback_difficulty: Difficulty,
    limits: &PlanLimits,
) -> PortResult<GeneratedPlan> {
    let json = extract_json(reply).ok_or_else(|| {
        PortError::Upstream("AI response did not contain a JSON learning plan".to_string())
    })?;
    let raw: RawPlan = serde_json::from_str(json)
        .map_err(|e| PortError::Upstream(format!("AI response was not a valid plan: {}", e)))?;

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PortError::Upstream("AI response is missing a plan title".to_string()))?;

    let difficulty = raw
        .difficulty
        .and_then(|d| d.parse::<Difficulty>().ok())
        .unwrap_or(fallback_difficulty);

    let lessons: Vec<GeneratedLesson> = raw
        .lessons
        .into_iter()
        .filter_map(|lesson| {
            let title = lesson.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let mut external_resources = strings(lesson.external_resources);
            external_resources.truncate(limits.max_resources_per_lesson);
            Some(GeneratedLesson {
                title,
                objectives: strings(lesson.objectives),
                content: lesson.content.unwrap_or_default().trim().to_string(),
                external_resources,
                estimated_minutes: minutes(lesson.estimated_minutes),
                difficulty: lesson.difficulty.and_then(|d| d.parse().ok()),
            })
        })
        .take(limits.max_lessons)
        .collect();
    if lessons.is_empty() {
        return Err(PortError::Upstream(
            "AI response contained no lessons".to_string(),
        ));
    }

    let mut topics: Vec<String> = Vec::new();
    for topic in strings(raw.topics) {
        if !topics.iter().any(|t| t.eq_ignore_ascii_case(&topic)) {
            topics.push(topic);
        }
    }

    let estimated_duration = match raw.estimated_duration {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => format!("{} minutes", n),
        _ => {
            let total: u64 = lessons.iter().map(|l| l.estimated_minutes as u64).sum();
            format!("{} minutes", total)
        }
    };

    let quality_score = raw
        .quality_score
        .filter(|q| q.is_finite())
        .unwrap_or(DEFAULT_QUALITY_SCORE)
        .clamp(0.0, 1.0);

    Ok(GeneratedPlan {
        title,
        description: raw.description.unwrap_or_default().trim().to_string(),
        difficulty,
        estimated_duration,
        topics,
        quality_score,
        concepts: concepts(raw.concepts, lessons.len()),
        relations: relations(raw.relationships),
        lessons,
    })
}

//=========================================================================================
// `PlanGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlanGenerationService for OpenAiPlanAdapter {
    async fn generate_plan(&self, request: &PlanRequest) -> PortResult<GeneratedPlan> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_INSTRUCTIONS)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_message(request))
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(4000u32)
            .temperature(0.7)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(user_id = %request.user_id, model = %self.model, "Requesting learning plan");
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| classify_llm_error(e.to_string()))?;

        let reply = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Upstream("AI service returned an empty response".to_string()))?;

        let fallback = request.context.difficulty.unwrap_or_default();
        let plan = parse_generated_plan(&reply, fallback, &self.limits)?;
        info!(
            user_id = %request.user_id,
            lessons = plan.lessons.len(),
            "Learning plan generated"
        );
        Ok(plan)
    }
}
