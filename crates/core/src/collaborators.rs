//! Interfaces to the systems the engine reads from and writes to, plus in-memory
//! implementations for tests and the demo host.
//!
//! Every fallible call returns [`CollaboratorError`]; the engine never retries, it surfaces the
//! failure to whoever invoked the entry point.

use crate::context::EncounterContext;
use crate::document::HarmEvidenceDocument;
use crate::error::CollaboratorError;
use crate::event::ClinicalEvent;
use crate::interval::TimeWindow;
use crate::vocabulary::ObservationCode;
use chrono::{DateTime, Duration, Utc};
use harm_types::{EncounterId, SourceEventId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

// ============================================================================
// Traits
// ============================================================================

/// Read access to the clinical event stream.
pub trait EventHistorySource: Send + Sync {
    /// Events for `encounter_id` carrying any of `codes` with effective time in `window`.
    ///
    /// Order is unspecified and duplicates are allowed; the engine normalises both.
    fn query(
        &self,
        encounter_id: &EncounterId,
        codes: &[ObservationCode],
        window: &TimeWindow,
    ) -> CollaboratorResult<Vec<ClinicalEvent>>;
}

/// Snapshot access to the encounter lifecycle tracker.
pub trait EncounterContextSource: Send + Sync {
    /// `None` when the tracker does not know the encounter.
    fn current(&self, encounter_id: &EncounterId) -> CollaboratorResult<Option<EncounterContext>>;
}

/// Durable storage for harm evidence documents, keyed by encounter.
pub trait DocumentRepository: Send + Sync {
    fn read(&self, encounter_id: &EncounterId) -> CollaboratorResult<Option<HarmEvidenceDocument>>;

    /// Replace the stored document atomically.
    fn write(&self, document: &HarmEvidenceDocument) -> CollaboratorResult<()>;

    /// Remove the document. Deleting a missing document succeeds.
    fn delete(&self, encounter_id: &EncounterId) -> CollaboratorResult<()>;
}

/// Source of "now". Injected so tests control time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The full set of collaborators a service needs.
#[derive(Clone)]
pub struct Collaborators {
    pub history: Arc<dyn EventHistorySource>,
    pub contexts: Arc<dyn EncounterContextSource>,
    pub documents: Arc<dyn DocumentRepository>,
    pub clock: Arc<dyn Clock>,
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Switch used by the in-memory stores to simulate an outage.
#[derive(Debug, Default)]
struct Outage(AtomicBool);

impl Outage {
    fn set(&self, down: bool) {
        self.0.store(down, Ordering::SeqCst);
    }

    fn check(&self, collaborator: &'static str) -> CollaboratorResult<()> {
        if self.0.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable {
                collaborator,
                reason: "simulated outage".into(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// In-memory event history
// ============================================================================

#[derive(Debug, Default)]
struct EncounterEvents {
    seen: HashSet<SourceEventId>,
    events: Vec<ClinicalEvent>,
}

#[derive(Debug, Default)]
pub struct InMemoryEventHistory {
    encounters: Mutex<HashMap<EncounterId, EncounterEvents>>,
    outage: Outage,
}

impl InMemoryEventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `event`. Returns `false` if an event with the same `source_event_id` was already
    /// stored for this encounter.
    pub fn append(&self, encounter_id: &EncounterId, event: ClinicalEvent) -> bool {
        let mut encounters = lock(&self.encounters);
        let entry = encounters.entry(encounter_id.clone()).or_default();
        if !entry.seen.insert(event.source_event_id.clone()) {
            return false;
        }
        entry.events.push(event);
        true
    }

    pub fn set_unavailable(&self, down: bool) {
        self.outage.set(down);
    }
}

impl EventHistorySource for InMemoryEventHistory {
    fn query(
        &self,
        encounter_id: &EncounterId,
        codes: &[ObservationCode],
        window: &TimeWindow,
    ) -> CollaboratorResult<Vec<ClinicalEvent>> {
        self.outage.check("event history")?;
        let encounters = lock(&self.encounters);
        let Some(entry) = encounters.get(encounter_id) else {
            return Ok(Vec::new());
        };
        Ok(entry
            .events
            .iter()
            .filter(|event| window.contains(event.effective_time))
            .filter(|event| codes.iter().any(|code| event.has_code(*code)))
            .cloned()
            .collect())
    }
}

// ============================================================================
// In-memory encounter contexts
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryContexts {
    contexts: Mutex<HashMap<EncounterId, EncounterContext>>,
    outage: Outage,
}

impl InMemoryContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the context for its encounter.
    pub fn upsert(&self, context: EncounterContext) {
        lock(&self.contexts).insert(context.encounter_id.clone(), context);
    }

    pub fn remove(&self, encounter_id: &EncounterId) -> Option<EncounterContext> {
        lock(&self.contexts).remove(encounter_id)
    }

    pub fn set_unavailable(&self, down: bool) {
        self.outage.set(down);
    }
}

impl EncounterContextSource for InMemoryContexts {
    fn current(&self, encounter_id: &EncounterId) -> CollaboratorResult<Option<EncounterContext>> {
        self.outage.check("encounter context")?;
        Ok(lock(&self.contexts).get(encounter_id).cloned())
    }
}

// ============================================================================
// In-memory document repository
// ============================================================================

/// Keeps documents as serialised JSON, the same shape a persistent store would hold.
#[derive(Debug, Default)]
pub struct InMemoryDocumentRepository {
    documents: Mutex<HashMap<EncounterId, String>>,
    writes: Mutex<usize>,
    outage: Outage,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }

    pub fn len(&self) -> usize {
        lock(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.documents).is_empty()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.outage.set(down);
    }
}

fn rejected(reason: impl ToString) -> CollaboratorError {
    CollaboratorError::Rejected {
        collaborator: "document repository",
        reason: reason.to_string(),
    }
}

impl DocumentRepository for InMemoryDocumentRepository {
    fn read(&self, encounter_id: &EncounterId) -> CollaboratorResult<Option<HarmEvidenceDocument>> {
        self.outage.check("document repository")?;
        lock(&self.documents)
            .get(encounter_id)
            .map(|json| HarmEvidenceDocument::from_json(json).map_err(rejected))
            .transpose()
    }

    fn write(&self, document: &HarmEvidenceDocument) -> CollaboratorResult<()> {
        self.outage.check("document repository")?;
        let json = document.to_json().map_err(rejected)?;
        lock(&self.documents).insert(document.encounter_id.clone(), json);
        *lock(&self.writes) += 1;
        Ok(())
    }

    fn delete(&self, encounter_id: &EncounterId) -> CollaboratorResult<()> {
        self.outage.check("document repository")?;
        lock(&self.documents).remove(encounter_id);
        Ok(())
    }
}

// ============================================================================
// Clocks
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
