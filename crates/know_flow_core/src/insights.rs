//! crates/know_flow_core/src/insights.rs
//!
//! Recommendations and content search over a user's plans.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{text_enum, Difficulty, LearningPlan, PlanStatus};
use crate::protocol::SearchResult;

/// Completed lessons below this mastery are suggested for review.
pub const REVIEW_MASTERY_THRESHOLD: u8 = 60;

const SNIPPET_CHARS: usize = 160;

text_enum! {
    RecommendationKind, "recommendation kind" {
        Continue => "continue",
        Review => "review",
        Explore => "explore",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Recommendation {
    pub kind: RecommendationKind,
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    #[serde(default)]
    pub lesson_id: Option<Uuid>,
    pub title: String,
    pub reason: String,
}

/// Suggests what to study next.
///
/// Active plans contribute their next incomplete lesson (most recently accessed
/// plan first), then weakly mastered lessons are queued for review. When nothing
/// is in progress, one "explore" suggestion points at a fresh plan.
pub fn recommend(plans: &[LearningPlan], limit: usize) -> Vec<Recommendation> {
    let mut active: Vec<&LearningPlan> = plans
        .iter()
        .filter(|p| p.status == PlanStatus::Active)
        .collect();
    active.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));

    let mut out: Vec<Recommendation> = active
        .iter()
        .filter_map(|plan| {
            plan.next_lesson().map(|lesson| Recommendation {
                kind: RecommendationKind::Continue,
                plan_id: Some(plan.id),
                lesson_id: Some(lesson.id),
                title: lesson.title.clone(),
                reason: format!(
                    "Next lesson in \"{}\" ({}% complete)",
                    plan.title, plan.progress
                ),
            })
        })
        .collect();

    let mut weak: Vec<(&LearningPlan, &crate::domain::Lesson)> = plans
        .iter()
        .filter(|p| p.status != PlanStatus::Archived)
        .flat_map(|p| p.lessons.iter().map(move |l| (p, l)))
        .filter(|(_, l)| l.completed && l.mastery_level < REVIEW_MASTERY_THRESHOLD)
        .collect();
    weak.sort_by_key(|(_, l)| l.mastery_level);
    out.extend(weak.into_iter().map(|(plan, lesson)| Recommendation {
        kind: RecommendationKind::Review,
        plan_id: Some(plan.id),
        lesson_id: Some(lesson.id),
        title: lesson.title.clone(),
        reason: format!("Mastery is {}%, a review will help it stick", lesson.mastery_level),
    }));

    if !out.iter().any(|r| r.kind == RecommendationKind::Continue) {
        let topic = plans
            .iter()
            .filter(|p| p.status == PlanStatus::Completed)
            .max_by_key(|p| p.last_accessed)
            .and_then(|p| p.topics.first().cloned());
        let (title, reason) = match topic {
            Some(topic) => (
                format!("Go deeper into {}", topic),
                "You finished a plan on this topic".to_string(),
            ),
            None => (
                "Start a new learning plan".to_string(),
                "No plan is in progress".to_string(),
            ),
        };
        out.push(Recommendation {
            kind: RecommendationKind::Explore,
            plan_id: None,
            lesson_id: None,
            title,
            reason,
        });
    }

    out.truncate(limit);
    out
}

/// Search criteria applied by [`search`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    pub difficulty: Option<Difficulty>,
    pub topics: Vec<String>,
}

impl SearchQuery {
    fn terms(&self) -> Vec<String> {
        self.text
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn accepts(&self, plan: &LearningPlan) -> bool {
        if self.difficulty.is_some_and(|d| d != plan.difficulty) {
            return false;
        }
        self.topics.is_empty()
            || self.topics.iter().any(|wanted| {
                let wanted = wanted.to_lowercase();
                plan.topics.iter().any(|t| t.to_lowercase() == wanted)
                    || plan.title.to_lowercase().contains(&wanted)
            })
    }
}

/// Ranks plans and lessons whose text matches every-or-some query term.
///
/// Weights: plan title 3, topic 2, description 1; lesson title 2, objective 1, content 1.
pub fn search(plans: &[LearningPlan], query: &SearchQuery, limit: usize) -> Vec<SearchResult> {
    let terms = query.terms();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for plan in plans.iter().filter(|p| query.accepts(p)) {
        let title = plan.title.to_lowercase();
        let description = plan.description.to_lowercase();
        let topics: Vec<String> = plan.topics.iter().map(|t| t.to_lowercase()).collect();

        let plan_score: u32 = terms
            .iter()
            .map(|term| {
                let mut score = 0;
                if title.contains(term.as_str()) {
                    score += 3;
                }
                if topics.iter().any(|t| t.contains(term.as_str())) {
                    score += 2;
                }
                if description.contains(term.as_str()) {
                    score += 1;
                }
                score
            })
            .sum();
        if plan_score > 0 {
            hits.push(SearchResult {
                plan_id: plan.id,
                plan_title: plan.title.clone(),
                lesson_id: None,
                lesson_title: None,
                snippet: snippet(&plan.description, &terms),
                score: plan_score,
            });
        }

        for lesson in &plan.lessons {
            let lesson_title = lesson.title.to_lowercase();
            let content = lesson.content.to_lowercase();
            let objectives: Vec<String> = lesson.objectives.iter().map(|o| o.to_lowercase()).collect();
            let score: u32 = terms
                .iter()
                .map(|term| {
                    let mut score = 0;
                    if lesson_title.contains(term.as_str()) {
                        score += 2;
                    }
                    if objectives.iter().any(|o| o.contains(term.as_str())) {
                        score += 1;
                    }
                    if content.contains(term.as_str()) {
                        score += 1;
                    }
                    score
                })
                .sum();
            if score > 0 {
                let source = if lesson.content.is_empty() {
                    &lesson.title
                } else {
                    &lesson.content
                };
                hits.push(SearchResult {
                    plan_id: plan.id,
                    plan_title: plan.title.clone(),
                    lesson_id: Some(lesson.id),
                    lesson_title: Some(lesson.title.clone()),
                    snippet: snippet(source, &terms),
                    score,
                });
            }
        }
    }

    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.plan_title.cmp(&b.plan_title))
            .then_with(|| a.lesson_title.cmp(&b.lesson_title))
    });
    hits.truncate(limit);
    hits
}

/// A short excerpt of `text` around the first matching term.
fn snippet(text: &str, terms: &[String]) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SNIPPET_CHARS {
        return text.to_string();
    }

    let lowered: Vec<char> = chars.iter().map(|c| c.to_ascii_lowercase()).collect();
    let position = terms
        .iter()
        .filter_map(|term| {
            let needle: Vec<char> = term.chars().collect();
            lowered.windows(needle.len()).position(|w| w == needle.as_slice())
        })
        .min()
        .unwrap_or(0);

    let start = position.saturating_sub(SNIPPET_CHARS / 4);
    let end = (start + SNIPPET_CHARS).min(chars.len());
    let mut excerpt: String = chars[start..end].iter().collect();
    if start > 0 {
        excerpt.insert_str(0, "...");
    }
    if end < chars.len() {
        excerpt.push_str("...");
    }
    excerpt
}
