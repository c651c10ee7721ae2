//! examguard-core: exam session engine, scoring and integrity monitoring.
//!
//! This crate defines the data model, the sans-IO session state machine, the
//! async controller that drives it, and the collaborator traits the rest of
//! the workspace implements.

pub mod availability;
pub mod catalog;
pub mod codes;
pub mod controller;
pub mod countdown;
pub mod error;
pub mod integrity;
pub mod model;
pub mod result;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod traits;
