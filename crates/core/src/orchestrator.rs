//! Update orchestrator: turns triggers into rule evaluations and document writes.
//!
//! ## Concurrency
//!
//! Each encounter has its own lock. All three entry points for an encounter serialise on it,
//! so a terminate can never interleave with an in-flight refresh. Different encounters proceed
//! in parallel. The lock table itself is only held long enough to find, create or release an
//! encounter's slot. A slot left `Uninitialized` by a trigger that did nothing is released again,
//! so stray encounter ids do not accumulate.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --event/tick--> Active --terminal status / terminate--> Terminated
//!                                  ^                                        |
//!                                  +---------------- admission -------------+
//! ```
//!
//! Once an encounter is `Terminated` nothing writes its document again until an admission
//! event re-opens it, so delete always wins over any later refresh.

use crate::classifier::{codes_for, EncounterTransition, EventClassifier, HarmCategory};
use crate::collaborators::{lock, Collaborators};
use crate::config::EngineConfig;
use crate::context::EncounterContext;
use crate::document::HarmEvidenceDocument;
use crate::event::{ClinicalEvent, EventHistory};
use crate::interval::TimeWindow;
use crate::rules::{self, RuleInput};
use crate::vocabulary::Vocabulary;
use crate::EngineResult;
use chrono::{DateTime, Utc};
use harm_types::EncounterId;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Where an encounter is in its lifecycle, as far as this engine is concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EncounterState {
    #[default]
    Uninitialized,
    Active,
    Terminated,
}

/// What an entry point did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Rules ran for `evaluated`; `written` are the categories whose sub-record changed.
    Refreshed {
        evaluated: BTreeSet<HarmCategory>,
        written: BTreeSet<HarmCategory>,
    },
    /// The document was deleted and the encounter closed.
    Terminated,
    /// Nothing to do: irrelevant event, closed encounter, or an encounter the context
    /// tracker does not know.
    Ignored,
}

/// The three ways an update can be triggered.
pub trait UpdateTrigger: Send + Sync {
    fn on_event(
        &self,
        event: &ClinicalEvent,
        encounter_id: &EncounterId,
    ) -> EngineResult<UpdateOutcome>;

    fn on_timer_tick(&self, encounter_id: &EncounterId) -> EngineResult<UpdateOutcome>;

    fn on_terminate(&self, encounter_id: &EncounterId) -> EngineResult<UpdateOutcome>;
}

type EncounterSlot = Arc<Mutex<EncounterState>>;

pub struct HarmEvidenceService {
    config: Arc<EngineConfig>,
    vocabulary: Arc<Vocabulary>,
    collaborators: Collaborators,
    encounters: Mutex<HashMap<EncounterId, EncounterSlot>>,
}

impl HarmEvidenceService {
    pub fn new(
        config: Arc<EngineConfig>,
        vocabulary: Arc<Vocabulary>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            vocabulary,
            collaborators,
            encounters: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Encounters a timer sweep should refresh, in id order.
    pub fn active_encounters(&self) -> Vec<EncounterId> {
        let slots: Vec<(EncounterId, EncounterSlot)> = lock(&self.encounters)
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut active: Vec<EncounterId> = slots
            .into_iter()
            .filter(|(_, slot)| *lock(slot) == EncounterState::Active)
            .map(|(id, _)| id)
            .collect();
        active.sort();
        active
    }

    pub fn state(&self, encounter_id: &EncounterId) -> EncounterState {
        let slot = lock(&self.encounters).get(encounter_id).map(Arc::clone);
        match slot {
            Some(slot) => {
                let state = *lock(&slot);
                state
            }
            None => EncounterState::Uninitialized,
        }
    }

    fn slot(&self, encounter_id: &EncounterId) -> EncounterSlot {
        Arc::clone(lock(&self.encounters).entry(encounter_id.clone()).or_default())
    }

    /// Drop `slot` from the table if it is still `Uninitialized` and no other trigger holds it.
    fn release_if_idle(&self, encounter_id: &EncounterId, slot: EncounterSlot) {
        let mut encounters = lock(&self.encounters);
        // Slots are only cloned under the table lock, so table + `slot` means no other holder.
        let unshared = Arc::strong_count(&slot) == 2
            && encounters
                .get(encounter_id)
                .is_some_and(|current| Arc::ptr_eq(current, &slot));
        if unshared && *lock(&slot) == EncounterState::Uninitialized {
            encounters.remove(encounter_id);
        }
    }

    #[cfg(test)]
    fn tracked_encounters(&self) -> usize {
        lock(&self.encounters).len()
    }

    /// The history window one refresh needs: everything any rule may read.
    fn query_window(&self, context: &EncounterContext, now: DateTime<Utc>) -> TimeWindow {
        let lookback = self.config.lab_lookback().max(self.config.vitals_lookback());
        let earliest = TimeWindow::lookback(now, lookback)
            .start()
            .map_or(context.admission_time, |start| start.min(context.admission_time));
        TimeWindow::since(earliest)
    }

    /// Evaluate `categories` and persist any changed sub-records.
    ///
    /// Must be called with the encounter's lock held.
    fn refresh(
        &self,
        encounter_id: &EncounterId,
        categories: &BTreeSet<HarmCategory>,
        trigger: Option<&ClinicalEvent>,
    ) -> EngineResult<UpdateOutcome> {
        let now = self.collaborators.clock.now();

        let Some(context) = self.collaborators.contexts.current(encounter_id)? else {
            tracing::debug!(%encounter_id, "no encounter context; skipping refresh");
            return Ok(UpdateOutcome::Ignored);
        };

        let codes = codes_for(categories);
        let events = self.collaborators.history.query(
            encounter_id,
            &codes,
            &self.query_window(&context, now),
        )?;
        let mut history = EventHistory::new(events);
        if let Some(event) = trigger {
            // The triggering event may not be visible to the history source yet.
            history = history.including(event);
        }

        let input = RuleInput {
            history: &history,
            context: &context,
            now,
            vocabulary: &self.vocabulary,
            config: &self.config,
        };

        let mut document = self
            .collaborators
            .documents
            .read(encounter_id)?
            .unwrap_or_else(|| HarmEvidenceDocument::new(encounter_id.clone(), now));

        let mut written = BTreeSet::new();
        for category in categories {
            let value = rules::evaluate(*category, &input);
            if document.merge(value, now).needs_write() {
                written.insert(*category);
            }
        }

        if !written.is_empty() {
            self.collaborators.documents.write(&document)?;
        }

        tracing::debug!(
            %encounter_id,
            evaluated = categories.len(),
            written = written.len(),
            "harm evidence refreshed"
        );

        Ok(UpdateOutcome::Refreshed {
            evaluated: categories.clone(),
            written,
        })
    }

    fn apply_event(
        &self,
        event: &ClinicalEvent,
        encounter_id: &EncounterId,
        transition: Option<EncounterTransition>,
        state: &mut EncounterState,
    ) -> EngineResult<UpdateOutcome> {
        let categories = match transition {
            Some(EncounterTransition::Admission) => {
                if *state == EncounterState::Terminated {
                    tracing::info!(%encounter_id, "encounter re-opened by admission");
                }
                Self::all_categories()
            }
            _ if *state == EncounterState::Terminated => {
                tracing::debug!(
                    %encounter_id,
                    source_event_id = %event.source_event_id,
                    "event for terminated encounter ignored"
                );
                return Ok(UpdateOutcome::Ignored);
            }
            _ => EventClassifier::new(&self.vocabulary).classify(event),
        };

        if categories.is_empty() {
            return Ok(UpdateOutcome::Ignored);
        }

        let outcome = self.refresh(encounter_id, &categories, Some(event))?;
        if matches!(outcome, UpdateOutcome::Refreshed { .. }) {
            *state = EncounterState::Active;
        }
        Ok(outcome)
    }

    fn apply_tick(
        &self,
        encounter_id: &EncounterId,
        state: &mut EncounterState,
    ) -> EngineResult<UpdateOutcome> {
        if *state == EncounterState::Terminated {
            return Ok(UpdateOutcome::Ignored);
        }

        let outcome = self.refresh(encounter_id, &Self::all_categories(), None)?;
        if matches!(outcome, UpdateOutcome::Refreshed { .. }) {
            *state = EncounterState::Active;
        }
        Ok(outcome)
    }

    fn all_categories() -> BTreeSet<HarmCategory> {
        HarmCategory::ALL.into_iter().collect()
    }
}

impl UpdateTrigger for HarmEvidenceService {
    fn on_event(
        &self,
        event: &ClinicalEvent,
        encounter_id: &EncounterId,
    ) -> EngineResult<UpdateOutcome> {
        let classifier = EventClassifier::new(&self.vocabulary);
        let transition = classifier.encounter_transition(event);

        if let Some(EncounterTransition::Terminal(status)) = transition {
            tracing::info!(%encounter_id, ?status, "terminal encounter status received");
            return self.on_terminate(encounter_id);
        }

        let slot = self.slot(encounter_id);
        let mut state = lock(&slot);
        let result = self.apply_event(event, encounter_id, transition, &mut state);
        drop(state);
        self.release_if_idle(encounter_id, slot);
        result
    }

    fn on_timer_tick(&self, encounter_id: &EncounterId) -> EngineResult<UpdateOutcome> {
        let slot = self.slot(encounter_id);
        let mut state = lock(&slot);
        let result = self.apply_tick(encounter_id, &mut state);
        drop(state);
        self.release_if_idle(encounter_id, slot);
        result
    }

    fn on_terminate(&self, encounter_id: &EncounterId) -> EngineResult<UpdateOutcome> {
        let slot = self.slot(encounter_id);
        let mut state = lock(&slot);

        // Closed before the delete so a failed delete still refuses later writes; the retry
        // deletes again.
        *state = EncounterState::Terminated;
        self.collaborators.documents.delete(encounter_id)?;

        tracing::info!(%encounter_id, "harm evidence document deleted");
        Ok(UpdateOutcome::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        CollaboratorResult, DocumentRepository, EventHistorySource, FixedClock, InMemoryContexts,
        InMemoryDocumentRepository, InMemoryEventHistory,
    };
    use crate::vocabulary::ObservationCode;
    use std::sync::mpsc;
    use crate::document::{CategoryValue, GoalsOfCareEvidence, Tristate};
    use crate::event::ClinicalValue;
    use crate::vocabulary::CodeStatus;
    use chrono::{Duration, TimeZone};
    use harm_types::SourceEventId;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn encounter() -> EncounterId {
        EncounterId::new("ENC-42").expect("id")
    }

    fn event(id: &str, code: &str, value: ClinicalValue, effective: DateTime<Utc>) -> ClinicalEvent {
        ClinicalEvent::new(code, value, effective, SourceEventId::new(id).expect("id"))
    }

    struct Harness {
        history: Arc<InMemoryEventHistory>,
        contexts: Arc<InMemoryContexts>,
        documents: Arc<InMemoryDocumentRepository>,
        clock: Arc<FixedClock>,
        service: HarmEvidenceService,
    }

    impl Harness {
        fn new() -> Self {
            let history = Arc::new(InMemoryEventHistory::new());
            Self::with_parts(EngineConfig::default(), history.clone(), history)
        }

        /// A harness whose service reads history through `source` instead of `history`.
        fn with_parts(
            config: EngineConfig,
            history: Arc<InMemoryEventHistory>,
            source: Arc<dyn EventHistorySource>,
        ) -> Self {
            let contexts = Arc::new(InMemoryContexts::new());
            let documents = Arc::new(InMemoryDocumentRepository::new());
            let clock = Arc::new(FixedClock::new(at(2, 12, 0)));

            contexts.upsert(EncounterContext::new(encounter(), "ICU-2", at(1, 0, 0)));

            let service = HarmEvidenceService::new(
                Arc::new(config),
                Arc::new(Vocabulary::load().expect("vocabulary")),
                Collaborators {
                    history: source,
                    contexts: contexts.clone(),
                    documents: documents.clone(),
                    clock: clock.clone(),
                },
            );

            Self {
                history,
                contexts,
                documents,
                clock,
                service,
            }
        }

        /// Deliver `event` the way the host does: append, then notify.
        fn deliver(&self, event: ClinicalEvent) -> EngineResult<UpdateOutcome> {
            self.history.append(&encounter(), event.clone());
            self.service.on_event(&event, &encounter())
        }

        fn document(&self) -> Option<HarmEvidenceDocument> {
            self.documents.read(&encounter()).expect("read")
        }
    }

    /// Pauses inside its first query until released, so a refresh can be caught mid-flight.
    struct PausingHistory {
        inner: Arc<InMemoryEventHistory>,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl EventHistorySource for PausingHistory {
        fn query(
            &self,
            encounter_id: &EncounterId,
            codes: &[ObservationCode],
            window: &TimeWindow,
        ) -> CollaboratorResult<Vec<ClinicalEvent>> {
            if let Some(entered) = self.entered.lock().expect("lock").take() {
                entered.send(()).expect("signal entry");
                let release = self.release.lock().expect("lock").take().expect("release");
                release.recv().expect("wait for release");
            }
            self.inner.query(encounter_id, codes, window)
        }
    }

    #[test]
    fn no_events_yields_defaults_stamped_at_first_computation() {
        let harness = Harness::new();
        let outcome = harness.service.on_timer_tick(&encounter()).expect("tick");
        assert!(matches!(outcome, UpdateOutcome::Refreshed { ref written, .. } if written.len() == 10));

        let document = harness.document().expect("document written");
        for category in HarmCategory::ALL {
            assert_eq!(document.update_time(category), Some(at(2, 12, 0)), "{category}");
        }
        assert_eq!(
            document.get(HarmCategory::GoalsOfCare),
            Some(CategoryValue::GoalsOfCare(GoalsOfCareEvidence::default()))
        );
        assert_eq!(harness.service.state(&encounter()), EncounterState::Active);
    }

    #[test]
    fn unchanged_recompute_leaves_stamp_and_skips_write() {
        let harness = Harness::new();
        harness.service.on_timer_tick(&encounter()).expect("tick");
        let writes = harness.documents.write_count();

        harness.clock.advance(Duration::minutes(5));
        let outcome = harness.service.on_timer_tick(&encounter()).expect("tick");
        assert!(matches!(outcome, UpdateOutcome::Refreshed { ref written, .. } if written.is_empty()));
        assert_eq!(harness.documents.write_count(), writes);
        assert_eq!(
            harness
                .document()
                .and_then(|d| d.update_time(HarmCategory::Mobility)),
            Some(at(2, 12, 0))
        );
    }

    #[test]
    fn changed_category_is_restamped_alone() {
        let harness = Harness::new();
        harness.service.on_timer_tick(&encounter()).expect("tick");

        harness.clock.set(at(2, 13, 0));
        let outcome = harness
            .deliver(event(
                "goc-1",
                "CODE_STATUS",
                ClinicalValue::coded("DNR"),
                at(2, 12, 30),
            ))
            .expect("event");
        assert_eq!(
            outcome,
            UpdateOutcome::Refreshed {
                evaluated: BTreeSet::from([HarmCategory::GoalsOfCare]),
                written: BTreeSet::from([HarmCategory::GoalsOfCare]),
            }
        );

        let document = harness.document().expect("document");
        assert_eq!(document.update_time(HarmCategory::GoalsOfCare), Some(at(2, 13, 0)));
        assert_eq!(document.update_time(HarmCategory::Mobility), Some(at(2, 12, 0)));
        assert_eq!(
            document.get(HarmCategory::GoalsOfCare),
            Some(CategoryValue::GoalsOfCare(GoalsOfCareEvidence {
                code_status: Some(CodeStatus::DoNotResuscitate),
                goals_discussed: Tristate::No,
            }))
        );
    }

    #[test]
    fn replaying_an_event_yields_identical_document() {
        let harness = Harness::new();
        let platelets = event(
            "lab-77",
            "PLT",
            ClinicalValue::quantity(41.0, "10*3/uL"),
            at(2, 11, 0),
        );

        harness.deliver(platelets.clone()).expect("first delivery");
        let first = harness.document().expect("document");
        let writes = harness.documents.write_count();

        harness.clock.advance(Duration::minutes(1));
        let outcome = harness.deliver(platelets).expect("replay");
        assert!(matches!(outcome, UpdateOutcome::Refreshed { ref written, .. } if written.is_empty()));
        assert_eq!(harness.document().expect("document"), first);
        assert_eq!(harness.documents.write_count(), writes);
    }

    #[test]
    fn irrelevant_event_is_ignored() {
        let harness = Harness::new();
        let outcome = harness
            .deliver(event(
                "na-1",
                "SODIUM",
                ClinicalValue::quantity(140.0, "mmol/L"),
                at(2, 11, 0),
            ))
            .expect("event");
        assert_eq!(outcome, UpdateOutcome::Ignored);
        assert!(harness.documents.is_empty());
        assert_eq!(harness.service.state(&encounter()), EncounterState::Uninitialized);
    }

    #[test]
    fn delete_wins_over_later_tick_and_events() {
        let harness = Harness::new();
        harness.service.on_timer_tick(&encounter()).expect("tick");
        assert_eq!(harness.documents.len(), 1);

        assert_eq!(
            harness.service.on_terminate(&encounter()).expect("terminate"),
            UpdateOutcome::Terminated
        );
        assert!(harness.documents.is_empty());

        assert_eq!(
            harness.service.on_timer_tick(&encounter()).expect("tick"),
            UpdateOutcome::Ignored
        );
        assert_eq!(
            harness
                .deliver(event("rass-1", "RASS", ClinicalValue::quantity(-2.0, "score"), at(2, 12, 0)))
                .expect("event"),
            UpdateOutcome::Ignored
        );
        assert!(harness.documents.is_empty());
        assert!(harness.service.active_encounters().is_empty());

        // Idempotent.
        assert_eq!(
            harness.service.on_terminate(&encounter()).expect("terminate again"),
            UpdateOutcome::Terminated
        );
    }

    #[test]
    fn terminal_status_event_deletes_document() {
        let harness = Harness::new();
        harness.service.on_timer_tick(&encounter()).expect("tick");

        let outcome = harness
            .deliver(event(
                "adt-9",
                "ENC_STATUS",
                ClinicalValue::coded("DISCHARGED"),
                at(2, 12, 0),
            ))
            .expect("discharge");
        assert_eq!(outcome, UpdateOutcome::Terminated);
        assert!(harness.documents.is_empty());
        assert_eq!(harness.service.state(&encounter()), EncounterState::Terminated);
    }

    #[test]
    fn readmission_starts_a_fresh_document() {
        let harness = Harness::new();
        harness
            .deliver(event(
                "goc-1",
                "CODE_STATUS",
                ClinicalValue::coded("CMO"),
                at(1, 6, 0),
            ))
            .expect("event");
        harness.service.on_terminate(&encounter()).expect("terminate");

        harness.clock.set(at(5, 9, 0));
        harness
            .contexts
            .upsert(EncounterContext::new(encounter(), "ICU-3", at(5, 8, 0)));
        let outcome = harness
            .deliver(event(
                "adt-10",
                "ENC_STATUS",
                ClinicalValue::coded("ADMITTED"),
                at(5, 8, 0),
            ))
            .expect("admission");
        assert!(matches!(outcome, UpdateOutcome::Refreshed { ref evaluated, .. } if evaluated.len() == 10));

        let document = harness.document().expect("fresh document");
        assert_eq!(document.created_at, at(5, 9, 0));
        assert_eq!(
            document.get(HarmCategory::GoalsOfCare),
            Some(CategoryValue::GoalsOfCare(GoalsOfCareEvidence::default()))
        );
        assert_eq!(harness.service.active_encounters(), vec![encounter()]);
    }

    #[test]
    fn collaborator_failure_is_retryable() {
        let harness = Harness::new();
        harness.documents.set_unavailable(true);

        let err = harness
            .service
            .on_timer_tick(&encounter())
            .expect_err("repository down");
        assert!(err.is_retryable());
        assert_eq!(harness.service.state(&encounter()), EncounterState::Uninitialized);

        harness.documents.set_unavailable(false);
        harness.service.on_timer_tick(&encounter()).expect("retry");
        assert_eq!(harness.service.state(&encounter()), EncounterState::Active);
    }

    #[test]
    fn unknown_encounter_context_is_ignored() {
        let harness = Harness::new();
        harness.contexts.remove(&encounter());
        assert_eq!(
            harness.service.on_timer_tick(&encounter()).expect("tick"),
            UpdateOutcome::Ignored
        );
        assert!(harness.documents.is_empty());
    }

    #[test]
    fn encounters_are_processed_in_parallel_without_lost_updates() {
        let harness = Arc::new(Harness::new());
        let ids: Vec<EncounterId> = (0..8)
            .map(|n| EncounterId::new(format!("ENC-P{n}")).expect("id"))
            .collect();
        for id in &ids {
            harness
                .contexts
                .upsert(EncounterContext::new(id.clone(), "ICU-5", at(1, 0, 0)));
        }

        std::thread::scope(|scope| {
            for id in &ids {
                let harness = Arc::clone(&harness);
                scope.spawn(move || {
                    for _ in 0..3 {
                        harness.service.on_timer_tick(id).expect("tick");
                    }
                });
            }
        });

        assert_eq!(harness.documents.len(), ids.len());
        assert_eq!(harness.service.active_encounters(), ids);
    }

    #[test]
    fn oversized_lookback_does_not_panic() {
        let history = Arc::new(InMemoryEventHistory::new());
        let config = EngineConfig::default()
            .with_lookbacks(Duration::hours(2_500_000_000), Duration::hours(12))
            .expect("positive lookbacks are valid");
        let harness = Harness::with_parts(config, history.clone(), history);

        harness
            .deliver(event(
                "plt-1",
                "PLT",
                ClinicalValue::quantity(41.0, "10*3/uL"),
                at(1, 6, 0),
            ))
            .expect("event");
        let outcome = harness.service.on_timer_tick(&encounter()).expect("tick");
        assert!(matches!(outcome, UpdateOutcome::Refreshed { .. }));
        assert!(harness.document().is_some());
    }

    #[test]
    fn ignored_triggers_do_not_grow_the_lock_table() {
        let harness = Harness::new();
        let stranger = EncounterId::new("ENC-UNKNOWN").expect("id");

        harness
            .deliver(event(
                "na-1",
                "SODIUM",
                ClinicalValue::quantity(140.0, "mmol/L"),
                at(2, 11, 0),
            ))
            .expect("irrelevant event");
        assert_eq!(
            harness.service.on_timer_tick(&stranger).expect("tick"),
            UpdateOutcome::Ignored
        );
        harness.documents.set_unavailable(true);
        harness
            .service
            .on_timer_tick(&encounter())
            .expect_err("repository down");
        harness.documents.set_unavailable(false);
        assert_eq!(harness.service.tracked_encounters(), 0);

        harness.service.on_timer_tick(&encounter()).expect("tick");
        assert_eq!(harness.service.tracked_encounters(), 1);
        harness.service.on_terminate(&encounter()).expect("terminate");
        assert_eq!(harness.service.tracked_encounters(), 1);
    }

    #[test]
    fn terminate_during_inflight_refresh_leaves_document_absent() {
        let history = Arc::new(InMemoryEventHistory::new());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let source = Arc::new(PausingHistory {
            inner: history.clone(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        let harness = Harness::with_parts(EngineConfig::default(), history, source);
        let rass = event("rass-1", "RASS", ClinicalValue::quantity(-2.0, "score"), at(2, 11, 0));
        harness.history.append(&encounter(), rass.clone());

        std::thread::scope(|scope| {
            let tick = scope.spawn(|| harness.service.on_timer_tick(&encounter()));
            entered_rx.recv().expect("refresh reached the history query");

            let terminate = scope.spawn(|| harness.service.on_terminate(&encounter()));
            let late_event = scope.spawn(|| harness.service.on_event(&rass, &encounter()));
            std::thread::sleep(std::time::Duration::from_millis(50));
            release_tx.send(()).expect("release refresh");

            let tick = tick.join().expect("tick thread").expect("tick");
            assert!(matches!(tick, UpdateOutcome::Refreshed { .. }));
            assert_eq!(
                terminate.join().expect("terminate thread").expect("terminate"),
                UpdateOutcome::Terminated
            );
            late_event.join().expect("event thread").expect("event");
        });

        assert!(harness.document().is_none());
        assert_eq!(harness.service.state(&encounter()), EncounterState::Terminated);
        assert_eq!(
            harness.service.on_timer_tick(&encounter()).expect("tick"),
            UpdateOutcome::Ignored
        );
        assert!(harness.documents.is_empty());
    }
}
