pub mod db;
pub mod memory;
pub mod plan_llm;

pub use db::DbAdapter;
pub use memory::MemoryAdapter;
pub use plan_llm::{OpenAiPlanAdapter, PlanLimits};
