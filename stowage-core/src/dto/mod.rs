//! Data Transfer Objects
//!
//! Request and response shapes used by the HTTP API and the services behind it.

pub mod policy;
pub mod run;
pub mod settings;
pub mod target;
