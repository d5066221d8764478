pub mod analytics;
pub mod domain;
pub mod insights;
pub mod knowledge;
pub mod ports;
pub mod protocol;

pub use analytics::{compute_analytics, Analytics, Timeframe};
pub use domain::{
    clamp_mastery, clamp_quality, derive_progress, Difficulty, GeneratedLesson, GeneratedPlan,
    LearningContext, LearningPlan, LearningPreferences, LearningStyle, Lesson, ParseEnumError,
    PlanStatus, PromptRecord, PromptStatus, StudySession, User, UserCredentials,
};
pub use insights::{recommend, search, Recommendation, RecommendationKind, SearchQuery};
pub use knowledge::{
    ConceptEdge, ConceptNode, ConceptRelation, GeneratedConcept, GeneratedRelation,
    KnowledgeGraph,
};
pub use ports::{
    DatabaseService, PlanFilter, PlanGenerationService, PlanRequest, PortError, PortResult,
    StoreCounts,
};
