//! # Harm Core
//!
//! Harm-evidence derivation for critical-care encounters.
//!
//! This crate turns a stream of clinical events into one continuously maintained harm evidence
//! document per encounter:
//! - Startup vocabularies mapping external codes to domain enums (`codes`, `vocabulary`)
//! - Event classification into harm categories (`classifier`)
//! - One pure rule per category over a de-duplicated event history (`rules`)
//! - Change-only merging with per-category update stamps (`document`)
//! - Per-encounter serialised updates on event, timer and terminate triggers (`orchestrator`)
//! - Rate-limited periodic refresh of the active census (`sweep`)
//!
//! **No transport concerns**: message delivery, persistence engines and HTTP surfaces live
//! behind the traits in `collaborators` and belong to the host.

pub mod classifier;
pub mod codes;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod context;
pub mod document;
pub mod error;
pub mod event;
pub mod interval;
pub mod orchestrator;
pub mod rules;
pub mod sweep;
pub mod units;
pub mod vocabulary;

pub use classifier::{EventClassifier, HarmCategory};
pub use collaborators::{
    Clock, Collaborators, DocumentRepository, EncounterContextSource, EventHistorySource,
    FixedClock, InMemoryContexts, InMemoryDocumentRepository, InMemoryEventHistory, SystemClock,
};
pub use config::EngineConfig;
pub use context::{EncounterContext, MedicationOrder, Procedure};
pub use document::{CategoryValue, HarmEvidenceDocument, MergeOutcome};
pub use error::{CollaboratorError, EngineError, EngineResult};
pub use event::{ClinicalEvent, ClinicalValue, EventHistory};
pub use interval::TimeWindow;
pub use orchestrator::{EncounterState, HarmEvidenceService, UpdateOutcome, UpdateTrigger};
pub use sweep::{run_sweep, SweepPlan, SweepReport};
pub use vocabulary::Vocabulary;
