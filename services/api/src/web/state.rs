//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use know_flow_core::ports::{DatabaseService, PlanGenerationService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub planner: Arc<dyn PlanGenerationService>,
    pub config: Arc<Config>,
    /// Which `DatabaseService` backs this process: `postgres` or `memory`.
    pub storage: &'static str,
    pub started_at: Instant,
    pub counters: GenerationCounters,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        planner: Arc<dyn PlanGenerationService>,
        config: Arc<Config>,
        storage: &'static str,
    ) -> Self {
        Self {
            db,
            planner,
            config,
            storage,
            started_at: Instant::now(),
            counters: GenerationCounters::default(),
        }
    }
}

/// Process-lifetime plan generation counters.
#[derive(Default)]
pub struct GenerationCounters {
    plans_generated: AtomicU64,
    generation_failures: AtomicU64,
}

impl GenerationCounters {
    pub fn record_success(&self, plans: u64) {
        self.plans_generated.fetch_add(plans, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn plans_generated(&self) -> u64 {
        self.plans_generated.load(Ordering::Relaxed)
    }

    pub fn generation_failures(&self) -> u64 {
        self.generation_failures.load(Ordering::Relaxed)
    }
}
