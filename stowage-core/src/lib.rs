//! Stowage Core
//!
//! Core types and abstractions for the Stowage backup orchestrator.
//!
//! This crate contains:
//! - Domain types: Core business entities (Target, BackupRun, SchedulePolicy)
//! - DTOs: Data transfer objects for the HTTP API and the services behind it

pub mod domain;
pub mod dto;
