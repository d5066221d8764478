//! crates/know_flow_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs carry serde derives because they travel unchanged between
//! the API service, its storage adapters and the client crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::{GeneratedConcept, GeneratedRelation, KnowledgeGraph};

/// Upper bound of a mastery level.
pub const MASTERY_MAX: u8 = 100;

/// Longest estimate a single lesson may carry: one day.
pub const MAX_LESSON_MINUTES: u32 = 24 * 60;

//=========================================================================================
// Text-backed enums
//=========================================================================================

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum that is stored and transmitted as lowercase text.
///
/// Every variant has one canonical spelling plus optional aliases. Serde
/// deserialization goes through `FromStr`, so JSON bodies and query strings
/// accept the same case-insensitive spellings.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(::serde::de::Error::custom)
            }
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The canonical lowercase spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::domain::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.trim().to_ascii_lowercase();
                match lowered.as_str() {
                    $( $text $(| $alias)* => Ok($name::$variant), )+
                    _ => Err($crate::domain::ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use text_enum;

text_enum! {
    /// Lifecycle state of a learning plan.
    PlanStatus, "plan status" {
        Active => "active",
        Completed => "completed",
        Paused => "paused",
        Archived => "archived",
    }
}

impl Default for PlanStatus {
    fn default() -> Self {
        PlanStatus::Active
    }
}

text_enum! {
    /// Difficulty of a plan, a lesson, or a learner's preference.
    Difficulty, "difficulty" {
        Beginner => "beginner" | "easy" | "basic",
        Intermediate => "intermediate" | "medium",
        Advanced => "advanced" | "hard" | "expert",
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Beginner
    }
}

text_enum! {
    /// The learner's preferred way of consuming material.
    LearningStyle, "learning style" {
        Visual => "visual",
        Auditory => "auditory" | "audio",
        Reading => "reading" | "reading_writing" | "read/write",
        Kinesthetic => "kinesthetic" | "hands-on" | "hands_on",
        Mixed => "mixed" | "multimodal",
    }
}

impl Default for LearningStyle {
    fn default() -> Self {
        LearningStyle::Mixed
    }
}

text_enum! {
    /// Processing state of a recorded prompt.
    PromptStatus, "prompt status" {
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

//=========================================================================================
// Derived values
//=========================================================================================

/// Clamps an arbitrary score into the mastery range `[0, 100]`.
pub fn clamp_mastery(level: i64) -> u8 {
    level.clamp(0, MASTERY_MAX as i64) as u8
}

/// Clamps a quality score into `[0, 1]`. Non-finite input counts as zero.
pub fn clamp_quality(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Percentage of completed lessons, rounded half up. A plan without lessons has no progress.
pub fn derive_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((200 * completed + total) / (2 * total)) as u8
}

//=========================================================================================
// Users
//=========================================================================================

/// Learning preferences used as default context for plan generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LearningPreferences {
    #[serde(default)]
    pub learning_style: LearningStyle,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Minutes per day the learner can dedicate.
    #[serde(default = "default_time_availability")]
    pub time_availability: u32,
}

fn default_time_availability() -> u32 {
    30
}

impl Default for LearningPreferences {
    fn default() -> Self {
        Self {
            learning_style: LearningStyle::default(),
            difficulty: Difficulty::default(),
            time_availability: default_time_availability(),
        }
    }
}

/// Represents a user - used throughout the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub preferences: LearningPreferences,
    /// The plan the user is currently working towards.
    #[serde(default)]
    pub current_goal: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub uid: String,
    pub email: String,
    pub hashed_password: String,
}

/// Learner context forwarded with a plan-generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LearningContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_style: Option<LearningStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_availability: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
}

impl LearningContext {
    /// Fills every unset field from the user's stored preferences.
    pub fn with_defaults(mut self, preferences: &LearningPreferences) -> Self {
        self.learning_style.get_or_insert(preferences.learning_style);
        self.difficulty.get_or_insert(preferences.difficulty);
        self.time_availability.get_or_insert(preferences.time_availability);
        self
    }
}

//=========================================================================================
// Plans and lessons
//=========================================================================================

/// An atomic unit of study content within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Lesson {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub external_resources: Vec<String>,
    pub order: u32,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub mastery_level: u8,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Lesson {
    /// Stores a mastery score, clamped into `[0, 100]`.
    pub fn set_mastery(&mut self, level: i64) {
        self.mastery_level = clamp_mastery(level);
    }

    /// Marks the lesson complete (or not) and keeps `completed_at` consistent.
    pub fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) {
        if completed && !self.completed {
            self.completed_at = Some(at);
        } else if !completed {
            self.completed_at = None;
        }
        self.completed = completed;
    }
}

/// A generated, persisted sequence of lessons for one user and one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LearningPlan {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub estimated_duration: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default)]
    pub quality_score: f64,
    #[serde(default)]
    pub source_prompt: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl LearningPlan {
    /// Builds a persisted plan from validated LLM output.
    pub fn from_generated(
        user_id: &str,
        source_prompt: &str,
        generated: GeneratedPlan,
        now: DateTime<Utc>,
    ) -> Self {
        let plan_id = Uuid::new_v4();
        let lessons = generated
            .lessons
            .into_iter()
            .enumerate()
            .map(|(index, lesson)| Lesson {
                id: Uuid::new_v4(),
                plan_id,
                title: lesson.title,
                objectives: lesson.objectives,
                content: lesson.content,
                external_resources: lesson.external_resources,
                order: index as u32,
                estimated_minutes: lesson.estimated_minutes.min(MAX_LESSON_MINUTES),
                difficulty: lesson.difficulty.unwrap_or(generated.difficulty),
                completed: false,
                mastery_level: 0,
                completed_at: None,
            })
            .collect();

        Self {
            id: plan_id,
            user_id: user_id.to_string(),
            title: generated.title,
            description: generated.description,
            status: PlanStatus::Active,
            lessons,
            progress: 0,
            difficulty: generated.difficulty,
            estimated_duration: generated.estimated_duration,
            topics: generated.topics,
            ai_generated: true,
            quality_score: clamp_quality(generated.quality_score),
            source_prompt: source_prompt.to_string(),
            created_at: now,
            last_accessed: now,
        }
    }

    /// Builds the plan together with its knowledge graph.
    pub fn from_generated_with_graph(
        user_id: &str,
        source_prompt: &str,
        mut generated: GeneratedPlan,
        now: DateTime<Utc>,
    ) -> (Self, KnowledgeGraph) {
        let concepts = std::mem::take(&mut generated.concepts);
        let relations = std::mem::take(&mut generated.relations);
        let plan = Self::from_generated(user_id, source_prompt, generated, now);
        let graph = KnowledgeGraph::for_plan(&plan, &concepts, &relations);
        (plan, graph)
    }

    pub fn completed_lessons(&self) -> usize {
        self.lessons.iter().filter(|l| l.completed).count()
    }

    pub fn lesson_mut(&mut self, lesson_id: Uuid) -> Option<&mut Lesson> {
        self.lessons.iter_mut().find(|l| l.id == lesson_id)
    }

    /// The first incomplete lesson in plan order.
    pub fn next_lesson(&self) -> Option<&Lesson> {
        self.lessons
            .iter()
            .filter(|l| !l.completed)
            .min_by_key(|l| l.order)
    }

    /// Re-derives `progress` from lesson completion and moves the plan between
    /// `active` and `completed` when it crosses 100%.
    pub fn recompute_progress(&mut self) {
        self.progress = derive_progress(self.completed_lessons(), self.lessons.len());
        match self.status {
            PlanStatus::Active if self.progress == 100 => self.status = PlanStatus::Completed,
            PlanStatus::Completed if self.progress < 100 => self.status = PlanStatus::Active,
            _ => {}
        }
    }

    /// Sum of the lessons' estimated minutes, saturating at `u32::MAX`.
    pub fn total_estimated_minutes(&self) -> u32 {
        self.lessons
            .iter()
            .fold(0u32, |total, l| total.saturating_add(l.estimated_minutes))
    }

    /// Pulls externally supplied scores back into range: mastery into
    /// `[0, 100]`, quality into `[0, 1]`, lesson estimates up to one day.
    pub fn clamp_scores(&mut self) {
        self.quality_score = clamp_quality(self.quality_score);
        for lesson in &mut self.lessons {
            lesson.set_mastery(lesson.mastery_level as i64);
            lesson.estimated_minutes = lesson.estimated_minutes.min(MAX_LESSON_MINUTES);
        }
    }
}

/// A lesson as produced by the plan generator, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedLesson {
    pub title: String,
    pub objectives: Vec<String>,
    pub content: String,
    pub external_resources: Vec<String>,
    pub estimated_minutes: u32,
    pub difficulty: Option<Difficulty>,
}

/// Validated plan-generator output.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_duration: String,
    pub topics: Vec<String>,
    /// Self-assessed quality in `[0, 1]`.
    pub quality_score: f64,
    pub lessons: Vec<GeneratedLesson>,
    /// Concepts for the knowledge graph. Empty means "derive from lessons".
    pub concepts: Vec<GeneratedConcept>,
    pub relations: Vec<GeneratedRelation>,
}

//=========================================================================================
// Study sessions and prompts
//=========================================================================================

/// A bounded interval of study activity linked to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: String,
    pub plan_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

impl StudySession {
    pub fn start(user_id: &str, plan_id: Uuid, concepts: Vec<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            plan_id,
            started_at: at,
            ended_at: None,
            concepts,
        }
    }

    /// Closes the session. Ending twice keeps the first end time; an end time
    /// before the start collapses to a zero-length session.
    pub fn end(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at.max(self.started_at));
        }
    }

    /// Whole minutes studied, or `None` while the session is still open.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_minutes().max(0))
    }
}

/// A prompt received for plan generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PromptRecord {
    pub id: Uuid,
    pub user_id: String,
    pub prompt: String,
    pub status: PromptStatus,
    pub plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
