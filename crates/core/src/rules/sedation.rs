//! Pain/agitation/sedation scoring and the delirium screen that depends on it.

use super::{as_recorded, freshest_number, RuleInput};
use crate::constants::{RASS_AGITATION_MIN, RASS_DEEP_SEDATION_MAX, RASS_UNABLE_TO_ASSESS_MAX};
use crate::document::{
    Assessment, CategoryValue, DeliriumEvidence, DeliriumStatus, SedationEvidence, SedationState,
    Tristate,
};
use crate::interval::TimeWindow;
use crate::vocabulary::{DeliriumResult, MedicationClass, ObservationCode};

/// RASS is an integer scale from -5 to +4; anything else is a charting error.
fn freshest_rass(input: &RuleInput<'_>, window: &TimeWindow) -> Option<i64> {
    freshest_number(input, ObservationCode::Rass, window, as_recorded)
        .filter(|score| score.fract() == 0.0 && (-5.0..=4.0).contains(score))
        .map(|score| score as i64)
}

fn sedation_state(rass: Option<i64>) -> SedationState {
    match rass {
        None => SedationState::NotAssessed,
        Some(score) if score <= RASS_DEEP_SEDATION_MAX => SedationState::Deep,
        Some(score) if score >= RASS_AGITATION_MIN => SedationState::Agitated,
        Some(_) => SedationState::Light,
    }
}

pub fn pain_agitation_sedation(input: &RuleInput<'_>) -> CategoryValue {
    let window = input.vitals_window();
    let rass_score = freshest_rass(input, &window);
    let pain_score = freshest_number(input, ObservationCode::PainScore, &window, as_recorded);
    let continuous_sedation = Tristate::from(
        input
            .context
            .orders_of_class(input.vocabulary, MedicationClass::SedativeInfusion)
            .any(|order| order.start <= input.now),
    );

    CategoryValue::PainAgitationSedation(SedationEvidence {
        rass_score,
        sedation_state: sedation_state(rass_score),
        pain_score,
        continuous_sedation,
    })
}

/// CAM-ICU screen for today's assessment window.
///
/// With no screen charted, a patient too deeply sedated to be screened reports
/// `UnableToAssess`; the screen itself still counts as not completed.
pub fn delirium(input: &RuleInput<'_>) -> CategoryValue {
    let window = input.assessment_day();
    let screen = input
        .history
        .freshest(ObservationCode::CamIcu, &window)
        .map(|event| {
            let result = event
                .value
                .as_text()
                .and_then(|value| input.vocabulary.delirium_results.lookup(value));
            if result.is_none() {
                tracing::debug!(
                    source_event_id = %event.source_event_id,
                    "unrecognised CAM-ICU result"
                );
            }
            result
        });

    let evidence = match screen {
        Some(result) => DeliriumEvidence {
            cam_icu: match result {
                Some(DeliriumResult::Positive) => DeliriumStatus::Positive,
                Some(DeliriumResult::Negative) => DeliriumStatus::Negative,
                Some(DeliriumResult::UnableToAssess) => DeliriumStatus::UnableToAssess,
                None => DeliriumStatus::NotAssessed,
            },
            assessed: Assessment::Completed,
        },
        None => {
            let too_sedated = freshest_rass(input, &input.vitals_window())
                .is_some_and(|score| score <= RASS_UNABLE_TO_ASSESS_MAX);
            DeliriumEvidence {
                cam_icu: if too_sedated {
                    DeliriumStatus::UnableToAssess
                } else {
                    DeliriumStatus::NotAssessed
                },
                assessed: Assessment::NotCompleted,
            }
        }
    };

    CategoryValue::Delirium(evidence)
}
