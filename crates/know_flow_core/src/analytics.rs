//! crates/know_flow_core/src/analytics.rs
//!
//! Read-only aggregates derived from a user's plans and study sessions.
//! Nothing here is persisted; every call recomputes from source data.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{derive_progress, text_enum, LearningPlan, PlanStatus, StudySession};

text_enum! {
    /// Window over which activity is aggregated.
    Timeframe, "timeframe" {
        Day => "day" | "today" | "24h",
        Week => "week" | "7d",
        Month => "month" | "30d",
        Year => "year" | "365d",
        All => "all" | "all_time",
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Week
    }
}

impl Timeframe {
    /// Start of the window ending at `now`, or `None` for all time.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match self {
            Timeframe::Day => 1,
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Year => 365,
            Timeframe::All => return None,
        };
        Some(now - Duration::days(days))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Analytics {
    pub timeframe: Timeframe,
    /// Minutes of finished sessions started inside the window.
    pub total_study_minutes: i64,
    pub sessions_count: usize,
    /// Consecutive days with at least one session, ending today or yesterday.
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    /// Completed lessons over all lessons of non-archived plans, 0–100.
    pub completion_rate: u8,
    pub lessons_completed: usize,
    pub lessons_total: usize,
    /// Lessons whose completion falls inside the window.
    pub lessons_completed_in_window: usize,
    pub active_plans: usize,
    pub completed_plans: usize,
    /// Mean mastery of completed lessons, 0 when none are completed.
    pub average_mastery: u8,
}

/// Aggregates plans and sessions over `timeframe`, relative to `now`.
pub fn compute_analytics(
    plans: &[LearningPlan],
    sessions: &[StudySession],
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Analytics {
    let window_start = timeframe.window_start(now);
    let in_window = |at: DateTime<Utc>| window_start.map_or(true, |start| at >= start) && at <= now;

    let windowed: Vec<&StudySession> = sessions.iter().filter(|s| in_window(s.started_at)).collect();
    let total_study_minutes: i64 = windowed.iter().filter_map(|s| s.duration_minutes()).sum();

    let counted_plans = plans.iter().filter(|p| p.status != PlanStatus::Archived);
    let mut lessons_total = 0;
    let mut lessons_completed = 0;
    let mut lessons_completed_in_window = 0;
    let mut mastery_sum: u64 = 0;
    for plan in counted_plans {
        lessons_total += plan.lessons.len();
        for lesson in plan.lessons.iter().filter(|l| l.completed) {
            lessons_completed += 1;
            mastery_sum += lesson.mastery_level as u64;
            if lesson.completed_at.is_some_and(in_window) {
                lessons_completed_in_window += 1;
            }
        }
    }

    let average_mastery = if lessons_completed == 0 {
        0
    } else {
        ((mastery_sum as f64) / (lessons_completed as f64)).round() as u8
    };

    let study_days: BTreeSet<NaiveDate> = sessions.iter().map(|s| s.started_at.date_naive()).collect();
    let (current_streak_days, longest_streak_days) = streaks(&study_days, now.date_naive());

    Analytics {
        timeframe,
        total_study_minutes,
        sessions_count: windowed.len(),
        current_streak_days,
        longest_streak_days,
        completion_rate: derive_progress(lessons_completed, lessons_total),
        lessons_completed,
        lessons_total,
        lessons_completed_in_window,
        active_plans: plans.iter().filter(|p| p.status == PlanStatus::Active).count(),
        completed_plans: plans.iter().filter(|p| p.status == PlanStatus::Completed).count(),
        average_mastery,
    }
}

/// Returns `(current, longest)` streak lengths in days.
fn streaks(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> (u32, u32) {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days.iter().copied().filter(|d| *d <= today) {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    // A streak survives until the end of the day after the last session.
    let mut cursor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt().filter(|d| days.contains(d))
    };
    let mut current = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        current += 1;
        cursor = day.pred_opt();
    }

    (current, longest)
}
