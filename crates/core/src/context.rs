//! Per-encounter state rules read alongside the event history.
//!
//! The context is owned and mutated by the external collaborator tracking the encounter
//! lifecycle; the engine receives a snapshot and only reads it.

use crate::vocabulary::{MedicationClass, ProcedureCode, Vocabulary};
use chrono::{DateTime, Utc};
use harm_types::EncounterId;
use serde::{Deserialize, Serialize};

/// A procedure or device episode, e.g. mechanical ventilation or an indwelling catheter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub procedure_id: String,
    /// External procedure code.
    pub code: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl Procedure {
    /// Open means no end time, or an end time after `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        match self.end {
            None => true,
            Some(end) => end > now,
        }
    }
}

/// A current medication order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationOrder {
    pub order_id: String,
    /// External therapeutic class code.
    pub class_code: String,
    /// External frequency code (e.g. `Q12H`); `None` for continuous infusions.
    pub frequency_code: Option<String>,
    pub start: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterContext {
    pub encounter_id: EncounterId,
    pub care_location: String,
    pub admission_time: DateTime<Utc>,
    pub active_procedures: Vec<Procedure>,
    pub ordered_medications: Vec<MedicationOrder>,
}

impl EncounterContext {
    pub fn new(
        encounter_id: EncounterId,
        care_location: impl Into<String>,
        admission_time: DateTime<Utc>,
    ) -> Self {
        Self {
            encounter_id,
            care_location: care_location.into(),
            admission_time,
            active_procedures: Vec::new(),
            ordered_medications: Vec::new(),
        }
    }

    pub fn with_procedure(mut self, procedure: Procedure) -> Self {
        self.active_procedures.push(procedure);
        self
    }

    pub fn with_medication(mut self, order: MedicationOrder) -> Self {
        self.ordered_medications.push(order);
        self
    }

    /// Procedures of kind `code` that are open at `now`.
    pub fn open_procedures<'a>(
        &'a self,
        vocabulary: &'a Vocabulary,
        code: ProcedureCode,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a Procedure> + 'a {
        self.active_procedures.iter().filter(move |procedure| {
            vocabulary.procedures.lookup(&procedure.code) == Some(code) && procedure.is_open_at(now)
        })
    }

    /// Gate for device/procedure driven categories.
    pub fn has_open_procedure(
        &self,
        vocabulary: &Vocabulary,
        code: ProcedureCode,
        now: DateTime<Utc>,
    ) -> bool {
        self.open_procedures(vocabulary, code, now).next().is_some()
    }

    /// Start of the longest-running open procedure of kind `code`.
    pub fn earliest_open_start(
        &self,
        vocabulary: &Vocabulary,
        code: ProcedureCode,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.open_procedures(vocabulary, code, now)
            .map(|procedure| procedure.start)
            .min()
    }

    /// Orders of therapeutic class `class`.
    pub fn orders_of_class<'a>(
        &'a self,
        vocabulary: &'a Vocabulary,
        class: MedicationClass,
    ) -> impl Iterator<Item = &'a MedicationOrder> + 'a {
        self.ordered_medications
            .iter()
            .filter(move |order| vocabulary.medication_classes.lookup(&order.class_code) == Some(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn procedure(id: &str, code: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Procedure {
        Procedure {
            procedure_id: id.into(),
            code: code.into(),
            start,
            end,
        }
    }

    #[test]
    fn procedure_open_until_end_time() {
        let p = procedure("p1", "FOLEY", at(1), Some(at(10)));
        assert!(p.is_open_at(at(9)));
        assert!(!p.is_open_at(at(10)));
        assert!(procedure("p2", "FOLEY", at(1), None).is_open_at(at(23)));
    }

    #[test]
    fn open_procedure_gate_matches_code() {
        let vocabulary = Vocabulary::load().expect("vocabulary");
        let ctx = EncounterContext::new(EncounterId::new("E1").expect("id"), "ICU-4", at(0))
            .with_procedure(procedure("vent-1", "MECH_VENT", at(2), None))
            .with_procedure(procedure("foley-1", "FOLEY", at(3), Some(at(5))));

        let now = at(6);
        assert!(ctx.has_open_procedure(&vocabulary, ProcedureCode::MechanicalVentilation, now));
        assert!(!ctx.has_open_procedure(&vocabulary, ProcedureCode::UrinaryCatheter, now));
        assert_eq!(
            ctx.earliest_open_start(&vocabulary, ProcedureCode::MechanicalVentilation, now),
            Some(at(2))
        );
        assert_eq!(
            ctx.earliest_open_start(&vocabulary, ProcedureCode::UrinaryCatheter, now - Duration::hours(2)),
            Some(at(3))
        );
    }
}
