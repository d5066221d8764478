//! services/api/src/lib.rs
//!
//! The Know-Flow API service: storage and LLM adapters, configuration and the
//! axum web layer. The binaries in `src/bin` wire these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
