//! Highest mobility level reached in the assessment day.

use super::RuleInput;
use crate::document::{Assessment, CategoryValue, MobilityEvidence};
use crate::vocabulary::ObservationCode;

/// Highest mobility level reached in today's assessment window.
pub fn mobility(input: &RuleInput<'_>) -> CategoryValue {
    let window = input.assessment_day();
    let mut recorded = false;
    let mut highest_level = None;

    for event in input.history.with_code(ObservationCode::Mobility) {
        if !window.contains(event.effective_time) {
            continue;
        }
        recorded = true;
        let level = event
            .value
            .as_text()
            .and_then(|value| input.vocabulary.mobility_levels.lookup(value));
        match level {
            Some(level) => highest_level = highest_level.max(Some(level)),
            None => tracing::debug!(
                source_event_id = %event.source_event_id,
                "unrecognised mobility level"
            ),
        }
    }

    CategoryValue::Mobility(MobilityEvidence {
        highest_level,
        assessed: if recorded {
            Assessment::Completed
        } else {
            Assessment::NotCompleted
        },
    })
}
