//! crates/know_flow_core/src/knowledge.rs
//!
//! The per-user knowledge graph: concepts taught by a plan's lessons and the
//! typed relationships between them. Concept mastery follows the mastery of
//! the lesson that teaches it and drives a simple review schedule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::{clamp_mastery, text_enum, LearningPlan};

text_enum! {
    /// How one concept relates to another.
    ConceptRelation, "concept relation" {
        RelatedTo => "related_to" | "related",
        PrerequisiteFor => "prerequisite_for" | "prerequisite",
        PartOf => "part_of",
    }
}

/// A concept the learner is working towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConceptNode {
    pub id: Uuid,
    pub user_id: String,
    pub plan_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mastery_level: u8,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_review: Option<DateTime<Utc>>,
    /// The lesson that teaches this concept, if any.
    #[serde(default)]
    pub source_lesson_id: Option<Uuid>,
}

impl ConceptNode {
    /// Records a review at `at` and schedules the next one from the new mastery.
    pub fn review(&mut self, mastery: i64, at: DateTime<Utc>) {
        self.mastery_level = clamp_mastery(mastery);
        self.last_reviewed = Some(at);
        self.next_review = Some(at + review_interval(self.mastery_level));
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review.is_some_and(|due| due <= now)
    }
}

/// A directed, typed relationship between two concepts of the same plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConceptEdge {
    pub id: Uuid,
    pub user_id: String,
    pub plan_id: Uuid,
    pub source_concept_id: Uuid,
    pub target_concept_id: Uuid,
    pub relation: ConceptRelation,
}

/// Concepts and edges, usually for one user and optionally one plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct KnowledgeGraph {
    pub nodes: Vec<ConceptNode>,
    pub edges: Vec<ConceptEdge>,
}

/// A concept named by the plan generator. `lesson` indexes the generated lessons.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedConcept {
    pub name: String,
    pub description: String,
    pub lesson: Option<usize>,
}

/// A relationship between two generated concepts, referenced by name.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRelation {
    pub source: String,
    pub target: String,
    pub relation: ConceptRelation,
}

/// Days until the next review for a given mastery.
pub fn review_interval(mastery: u8) -> Duration {
    match mastery {
        0..=39 => Duration::days(1),
        40..=69 => Duration::days(3),
        70..=89 => Duration::days(7),
        _ => Duration::days(14),
    }
}

impl KnowledgeGraph {
    /// Builds the graph for a freshly stored plan.
    ///
    /// Generated concepts are kept when their names are unique and non-empty;
    /// relations naming unknown concepts, or a concept and itself, are dropped.
    /// When the generator supplied no concepts, each lesson becomes one concept
    /// and consecutive lessons are chained with `prerequisite_for`. Concepts tied
    /// to a lesson start at that lesson's mastery.
    pub fn for_plan(
        plan: &LearningPlan,
        concepts: &[GeneratedConcept],
        relations: &[GeneratedRelation],
    ) -> Self {
        let mut graph = KnowledgeGraph::default();
        let mut by_name: HashMap<String, Uuid> = HashMap::new();

        for concept in concepts {
            let name = concept.name.trim();
            let key = name.to_lowercase();
            if name.is_empty() || by_name.contains_key(&key) {
                continue;
            }
            let node = graph.push_node(
                plan,
                name,
                concept.description.trim(),
                concept.lesson.and_then(|i| plan.lessons.get(i)).map(|l| l.id),
            );
            by_name.insert(key, node);
        }

        if graph.nodes.is_empty() {
            let mut ordered: Vec<_> = plan.lessons.iter().collect();
            ordered.sort_by_key(|l| l.order);
            let mut previous: Option<Uuid> = None;
            for lesson in ordered {
                let summary = lesson.objectives.first().map(String::as_str).unwrap_or("");
                let node = graph.push_node(plan, &lesson.title, summary, Some(lesson.id));
                if let Some(prev) = previous {
                    graph.push_edge(plan, prev, node, ConceptRelation::PrerequisiteFor);
                }
                previous = Some(node);
            }
            return graph;
        }

        let mut seen: HashSet<(Uuid, Uuid, ConceptRelation)> = HashSet::new();
        for relation in relations {
            let source = by_name.get(&relation.source.trim().to_lowercase());
            let target = by_name.get(&relation.target.trim().to_lowercase());
            if let (Some(&source), Some(&target)) = (source, target) {
                if source != target && seen.insert((source, target, relation.relation)) {
                    graph.push_edge(plan, source, target, relation.relation);
                }
            }
        }
        graph
    }

    fn push_node(
        &mut self,
        plan: &LearningPlan,
        name: &str,
        description: &str,
        source_lesson_id: Option<Uuid>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let mastery_level = plan
            .lessons
            .iter()
            .find(|l| Some(l.id) == source_lesson_id)
            .map_or(0, |l| l.mastery_level);
        self.nodes.push(ConceptNode {
            id,
            user_id: plan.user_id.clone(),
            plan_id: plan.id,
            name: name.to_string(),
            description: description.to_string(),
            mastery_level,
            last_reviewed: None,
            next_review: None,
            source_lesson_id,
        });
        id
    }

    fn push_edge(
        &mut self,
        plan: &LearningPlan,
        source: Uuid,
        target: Uuid,
        relation: ConceptRelation,
    ) {
        self.edges.push(ConceptEdge {
            id: Uuid::new_v4(),
            user_id: plan.user_id.clone(),
            plan_id: plan.id,
            source_concept_id: source,
            target_concept_id: target,
            relation,
        });
    }

    /// Concepts whose scheduled review has come due, most overdue first.
    pub fn due_for_review(&self, now: DateTime<Utc>) -> Vec<&ConceptNode> {
        let mut due: Vec<&ConceptNode> = self.nodes.iter().filter(|n| n.is_due(now)).collect();
        due.sort_by_key(|n| n.next_review);
        due
    }

    /// Concepts that must be understood before `concept_id`.
    pub fn prerequisites_of(&self, concept_id: Uuid) -> Vec<&ConceptNode> {
        let sources: HashSet<Uuid> = self
            .edges
            .iter()
            .filter(|e| {
                e.target_concept_id == concept_id && e.relation == ConceptRelation::PrerequisiteFor
            })
            .map(|e| e.source_concept_id)
            .collect();
        self.nodes.iter().filter(|n| sources.contains(&n.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Difficulty, Lesson, PlanStatus};

    fn plan(titles: &[&str]) -> LearningPlan {
        let id = Uuid::new_v4();
        let now = Utc::now();
        LearningPlan {
            id,
            user_id: "u1".into(),
            title: "Rust".into(),
            description: String::new(),
            status: PlanStatus::Active,
            lessons: titles
                .iter()
                .enumerate()
                .map(|(i, title)| Lesson {
                    id: Uuid::new_v4(),
                    plan_id: id,
                    title: title.to_string(),
                    objectives: vec![format!("Understand {}", title)],
                    content: String::new(),
                    external_resources: vec![],
                    order: i as u32,
                    estimated_minutes: 20,
                    difficulty: Difficulty::Beginner,
                    completed: false,
                    mastery_level: 0,
                    completed_at: None,
                })
                .collect(),
            progress: 0,
            difficulty: Difficulty::Beginner,
            estimated_duration: String::new(),
            topics: vec![],
            ai_generated: true,
            quality_score: 0.8,
            source_prompt: String::new(),
            created_at: now,
            last_accessed: now,
        }
    }

    fn concept(name: &str, lesson: Option<usize>) -> GeneratedConcept {
        GeneratedConcept {
            name: name.into(),
            description: String::new(),
            lesson,
        }
    }

    fn relation(source: &str, target: &str, relation: ConceptRelation) -> GeneratedRelation {
        GeneratedRelation {
            source: source.into(),
            target: target.into(),
            relation,
        }
    }

    #[test]
    fn lessons_become_a_prerequisite_chain_without_generated_concepts() {
        let plan = plan(&["Ownership", "Borrowing", "Lifetimes"]);
        let graph = KnowledgeGraph::for_plan(&plan, &[], &[]);

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[1].source_lesson_id, Some(plan.lessons[1].id));
        assert_eq!(graph.nodes[0].description, "Understand Ownership");
        assert_eq!(graph.edges.len(), 2);
        assert!(graph
            .edges
            .iter()
            .all(|e| e.relation == ConceptRelation::PrerequisiteFor && e.plan_id == plan.id));

        let lifetimes = graph.nodes[2].id;
        let before: Vec<&str> = graph
            .prerequisites_of(lifetimes)
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(before, vec!["Borrowing"]);
    }

    #[test]
    fn generated_relations_are_resolved_by_name() {
        let plan = plan(&["Ownership", "Borrowing"]);
        let concepts = vec![
            concept("Ownership", Some(0)),
            concept("Moves", Some(0)),
            concept("ownership", None),
            concept("  ", None),
            concept("Borrowing", Some(7)),
        ];
        let relations = vec![
            relation("ownership", "Borrowing", ConceptRelation::PrerequisiteFor),
            relation("Moves", "Ownership", ConceptRelation::PartOf),
            relation("Moves", "Ownership", ConceptRelation::PartOf),
            relation("Moves", "Moves", ConceptRelation::RelatedTo),
            relation("Moves", "Traits", ConceptRelation::RelatedTo),
        ];
        let graph = KnowledgeGraph::for_plan(&plan, &concepts, &relations);

        let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Ownership", "Moves", "Borrowing"]);
        assert_eq!(graph.nodes[0].source_lesson_id, Some(plan.lessons[0].id));
        assert_eq!(graph.nodes[2].source_lesson_id, None);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn reviews_schedule_from_mastery() {
        let plan = plan(&["Ownership"]);
        let mut graph = KnowledgeGraph::for_plan(&plan, &[], &[]);
        let now = Utc::now();

        graph.nodes[0].review(120, now);
        assert_eq!(graph.nodes[0].mastery_level, 100);
        assert_eq!(graph.nodes[0].next_review, Some(now + Duration::days(14)));
        assert!(graph.due_for_review(now).is_empty());
        assert_eq!(graph.due_for_review(now + Duration::days(15)).len(), 1);

        graph.nodes[0].review(10, now);
        assert_eq!(graph.nodes[0].next_review, Some(now + Duration::days(1)));
    }

    #[test]
    fn relation_names_accept_short_forms() {
        assert_eq!(
            "prerequisite".parse::<ConceptRelation>().unwrap(),
            ConceptRelation::PrerequisiteFor
        );
        let json = serde_json::to_string(&ConceptRelation::PartOf).unwrap();
        assert_eq!(json, "\"part_of\"");
    }
}
