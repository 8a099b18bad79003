//! Core domain types
//!
//! This module contains the core domain structures used across Stowage crates.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (for persistence) and the runner (for execution).

pub mod policy;
pub mod run;
pub mod target;
