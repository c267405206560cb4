//! Event classifier: which harm categories a clinical event is relevant to.

use crate::codes::ExternalCode;
use crate::event::ClinicalEvent;
use crate::vocabulary::{EncounterStatusCode, ObservationCode, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One independently tracked clinical-risk indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmCategory {
    Demographics,
    CentralLines,
    UrinaryCatheter,
    PainAgitationSedation,
    Delirium,
    Mobility,
    Ventilation,
    Thromboembolism,
    RespectDignity,
    GoalsOfCare,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 10] = [
        Self::Demographics,
        Self::CentralLines,
        Self::UrinaryCatheter,
        Self::PainAgitationSedation,
        Self::Delirium,
        Self::Mobility,
        Self::Ventilation,
        Self::Thromboembolism,
        Self::RespectDignity,
        Self::GoalsOfCare,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Demographics => "demographics",
            Self::CentralLines => "central_lines",
            Self::UrinaryCatheter => "urinary_catheter",
            Self::PainAgitationSedation => "pain_agitation_sedation",
            Self::Delirium => "delirium",
            Self::Mobility => "mobility",
            Self::Ventilation => "ventilation",
            Self::Thromboembolism => "thromboembolism",
            Self::RespectDignity => "respect_dignity",
            Self::GoalsOfCare => "goals_of_care",
        }
    }
}

impl fmt::Display for HarmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relevance table: the categories whose rules read events carrying `code`.
pub fn categories_for(code: ObservationCode) -> &'static [HarmCategory] {
    use HarmCategory::*;
    use ObservationCode as O;

    match code {
        O::PlateletCount | O::Inr | O::Aptt | O::VteProphylaxisGiven => &[Thromboembolism],
        O::DosingWeight | O::ClinicalWeight | O::AdmissionWeight => {
            &[Demographics, Thromboembolism]
        }
        O::Height => &[Demographics],
        O::Rass => &[PainAgitationSedation, Delirium],
        O::PainScore => &[PainAgitationSedation],
        O::CamIcu => &[Delirium],
        O::Mobility => &[Mobility],
        O::HeadOfBedAngle | O::AwakeningTrial | O::BreathingTrial => &[Ventilation],
        O::CentralLine | O::LineNecessity => &[CentralLines],
        O::CatheterNecessity => &[UrinaryCatheter],
        O::CareTeamIntroduced | O::FamilyEngaged => &[RespectDignity],
        O::CodeStatus | O::GoalsDiscussed => &[GoalsOfCare],
        // Lifecycle events drive the orchestrator state machine, not a rule.
        O::EncounterStatus => &[],
    }
}

/// Union of the observation codes the rules for `categories` read.
pub fn codes_for(categories: &BTreeSet<HarmCategory>) -> Vec<ObservationCode> {
    ObservationCode::ALL
        .iter()
        .copied()
        .filter(|code| {
            categories_for(*code)
                .iter()
                .any(|category| categories.contains(category))
        })
        .collect()
}

/// What an encounter-status event means for the encounter lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncounterTransition {
    Admission,
    Terminal(EncounterStatusCode),
}

/// Classifies events against the startup vocabulary.
#[derive(Clone, Copy, Debug)]
pub struct EventClassifier<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> EventClassifier<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Harm categories `event` is relevant to. Unrecognised codes classify to the empty set.
    pub fn classify(&self, event: &ClinicalEvent) -> BTreeSet<HarmCategory> {
        match self.vocabulary.observations.lookup(&event.category_code) {
            Some(code) => categories_for(code).iter().copied().collect(),
            None => {
                tracing::debug!(
                    code = %event.category_code,
                    source_event_id = %event.source_event_id,
                    "ignoring event with unrecognised code"
                );
                BTreeSet::new()
            }
        }
    }

    /// Lifecycle meaning of an encounter-status event, or `None` for any other event, an
    /// informational status such as a transfer, or an unrecognised status value.
    pub fn encounter_transition(&self, event: &ClinicalEvent) -> Option<EncounterTransition> {
        if self.vocabulary.observations.lookup(&event.category_code)
            != Some(ObservationCode::EncounterStatus)
        {
            return None;
        }
        let status = event
            .value
            .as_text()
            .and_then(|value| self.vocabulary.encounter_statuses.lookup(value));

        match status {
            Some(EncounterStatusCode::Admitted) => Some(EncounterTransition::Admission),
            Some(status) if status.is_terminal() => Some(EncounterTransition::Terminal(status)),
            Some(_) => None,
            None => {
                tracing::debug!(
                    source_event_id = %event.source_event_id,
                    "encounter status event with unrecognised value"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ClinicalValue;
    use chrono::{TimeZone, Utc};
    use harm_types::SourceEventId;

    fn event(code: &str, value: ClinicalValue) -> ClinicalEvent {
        ClinicalEvent::new(
            code,
            value,
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0)
                .single()
                .expect("valid timestamp"),
            SourceEventId::new("msg-1").expect("valid id"),
        )
    }

    #[test]
    fn weight_feeds_demographics_and_dosing() {
        let vocabulary = Vocabulary::load().expect("vocabulary");
        let classifier = EventClassifier::new(&vocabulary);

        let categories = classifier.classify(&event("WT_CLINICAL", ClinicalValue::quantity(80.0, "kg")));
        assert_eq!(
            categories,
            BTreeSet::from([HarmCategory::Demographics, HarmCategory::Thromboembolism])
        );
    }

    #[test]
    fn unknown_code_classifies_to_empty_set() {
        let vocabulary = Vocabulary::load().expect("vocabulary");
        let classifier = EventClassifier::new(&vocabulary);

        assert!(classifier
            .classify(&event("SODIUM", ClinicalValue::quantity(140.0, "mmol/L")))
            .is_empty());
    }

    #[test]
    fn every_category_has_at_least_one_code() {
        for category in HarmCategory::ALL {
            let codes = codes_for(&BTreeSet::from([category]));
            assert!(!codes.is_empty(), "{category} reads no codes");
        }
    }

    #[test]
    fn recognises_encounter_transitions() {
        let vocabulary = Vocabulary::load().expect("vocabulary");
        let classifier = EventClassifier::new(&vocabulary);

        let discharge = event("ENC_STATUS", ClinicalValue::coded("DISCHARGED"));
        assert_eq!(
            classifier.encounter_transition(&discharge),
            Some(EncounterTransition::Terminal(EncounterStatusCode::Discharged))
        );
        assert!(classifier.classify(&discharge).is_empty());

        let admit = event("ENC_STATUS", ClinicalValue::coded("ADMITTED"));
        assert_eq!(
            classifier.encounter_transition(&admit),
            Some(EncounterTransition::Admission)
        );

        let transfer = event("ENC_STATUS", ClinicalValue::coded("TRANSFERRED"));
        assert_eq!(classifier.encounter_transition(&transfer), None);

        let unknown = event("ENC_STATUS", ClinicalValue::coded("ON_LEAVE"));
        assert_eq!(classifier.encounter_transition(&unknown), None);

        let lab = event("PLT", ClinicalValue::quantity(200.0, "10*3/uL"));
        assert_eq!(classifier.encounter_transition(&lab), None);
    }
}
