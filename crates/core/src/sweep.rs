//! Rate-limited periodic refresh of every active encounter.
//!
//! Time-based categories (daily assessment windows, dose timing) change without any new event,
//! so the host refreshes active encounters on a timer. A sweep runs encounters in fixed-size
//! batches with a pause in between so a large census never floods the collaborators.

use crate::orchestrator::{UpdateOutcome, UpdateTrigger};
use crate::{EngineError, EngineResult};
use harm_types::EncounterId;
use std::time::Duration;

/// Encounters to refresh, split into batches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepPlan {
    batches: Vec<Vec<EncounterId>>,
}

impl SweepPlan {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `batch_size` is zero.
    pub fn new(
        encounter_ids: impl IntoIterator<Item = EncounterId>,
        batch_size: usize,
    ) -> EngineResult<Self> {
        if batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "sweep batch size must be positive".into(),
            ));
        }
        let ids: Vec<EncounterId> = encounter_ids.into_iter().collect();
        let batches = ids.chunks(batch_size).map(<[EncounterId]>::to_vec).collect();
        Ok(Self { batches })
    }

    pub fn batches(&self) -> &[Vec<EncounterId>] {
        &self.batches
    }

    /// Total number of encounters in the plan.
    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Tally of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refreshed: usize,
    pub skipped: usize,
    /// Encounters whose refresh failed; the host decides whether to retry them.
    pub failed: Vec<EncounterId>,
}

/// Ticks every encounter in `plan`, pausing `pause` between batches.
///
/// Failures are logged and collected, never propagated: one unavailable collaborator must not
/// stop the rest of the census from refreshing.
pub fn run_sweep(trigger: &dyn UpdateTrigger, plan: &SweepPlan, pause: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    for (index, batch) in plan.batches().iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        for encounter_id in batch {
            match trigger.on_timer_tick(encounter_id) {
                Ok(UpdateOutcome::Refreshed { .. }) => report.refreshed += 1,
                Ok(_) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(
                        %encounter_id,
                        retryable = err.is_retryable(),
                        "timer refresh failed: {err}"
                    );
                    report.failed.push(encounter_id.clone());
                }
            }
        }
    }

    tracing::info!(
        refreshed = report.refreshed,
        skipped = report.skipped,
        failed = report.failed.len(),
        "sweep complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::HarmCategory;
    use crate::error::CollaboratorError;
    use crate::event::ClinicalEvent;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn ids(n: usize) -> Vec<EncounterId> {
        (0..n)
            .map(|i| EncounterId::new(format!("ENC-{i:02}")).expect("id"))
            .collect()
    }

    /// Refreshes everything except a fixed set of failing and closed encounters.
    struct ScriptedTrigger {
        failing: Vec<EncounterId>,
        closed: Vec<EncounterId>,
        ticked: Mutex<Vec<EncounterId>>,
    }

    impl UpdateTrigger for ScriptedTrigger {
        fn on_event(
            &self,
            _event: &ClinicalEvent,
            _encounter_id: &EncounterId,
        ) -> EngineResult<UpdateOutcome> {
            Ok(UpdateOutcome::Ignored)
        }

        fn on_timer_tick(&self, encounter_id: &EncounterId) -> EngineResult<UpdateOutcome> {
            self.ticked
                .lock()
                .expect("lock")
                .push(encounter_id.clone());
            if self.failing.contains(encounter_id) {
                return Err(CollaboratorError::Unavailable {
                    collaborator: "event history",
                    reason: "timeout".into(),
                }
                .into());
            }
            if self.closed.contains(encounter_id) {
                return Ok(UpdateOutcome::Ignored);
            }
            Ok(UpdateOutcome::Refreshed {
                evaluated: BTreeSet::from([HarmCategory::Mobility]),
                written: BTreeSet::new(),
            })
        }

        fn on_terminate(&self, _encounter_id: &EncounterId) -> EngineResult<UpdateOutcome> {
            Ok(UpdateOutcome::Terminated)
        }
    }

    #[test]
    fn plan_splits_into_batches() {
        let plan = SweepPlan::new(ids(5), 2).expect("plan");
        let sizes: Vec<usize> = plan.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(plan.len(), 5);

        assert!(SweepPlan::new(ids(0), 2).expect("plan").is_empty());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = SweepPlan::new(ids(3), 0).expect_err("invalid");
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn sweep_counts_outcomes_and_continues_past_failures() {
        let all = ids(5);
        let trigger = ScriptedTrigger {
            failing: vec![all[1].clone()],
            closed: vec![all[3].clone()],
            ticked: Mutex::new(Vec::new()),
        };
        let plan = SweepPlan::new(all.clone(), 2).expect("plan");

        let report = run_sweep(&trigger, &plan, Duration::ZERO);
        assert_eq!(report.refreshed, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, vec![all[1].clone()]);
        assert_eq!(*trigger.ticked.lock().expect("lock"), all);
    }
}
