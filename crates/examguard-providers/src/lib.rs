//! examguard-providers: collaborator implementations.
//!
//! Exam lookups (local catalog, HTTP), result persisters (JSON-lines file,
//! memory, HTTP), scripted media permission, and configuration loading.

pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod store;

pub use catalog::CatalogLookup;
pub use config::{
    create_lookup, create_persister, load_config, load_config_from, ExamguardConfig,
    ProctoringConfig,
};
pub use error::{LookupError, PersistError};
pub use http::{HttpExamLookup, HttpResultPersister};
pub use media::{PermissionOutcome, ScriptedMedia, SimulatedStream};
pub use store::{filter_by_exam, JsonlResultStore, MemoryResultStore};
