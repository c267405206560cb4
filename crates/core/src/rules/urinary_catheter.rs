//! Indwelling urinary catheter days and the daily necessity review.

use super::{daily_assessment, RuleInput};
use crate::document::{CategoryValue, Tristate, UrinaryCatheterEvidence};
use crate::vocabulary::{ObservationCode, ProcedureCode};

/// Indwelling urinary catheter, gated on an open catheter procedure.
pub fn urinary_catheter(input: &RuleInput<'_>) -> CategoryValue {
    let Some(inserted) = input.context.earliest_open_start(
        input.vocabulary,
        ProcedureCode::UrinaryCatheter,
        input.now,
    ) else {
        return CategoryValue::UrinaryCatheter(UrinaryCatheterEvidence::default());
    };

    CategoryValue::UrinaryCatheter(UrinaryCatheterEvidence {
        catheter_present: Tristate::Yes,
        necessity_assessed: daily_assessment(input, ObservationCode::CatheterNecessity, true),
        catheter_days: Some(input.calendar_days_since(inserted)),
    })
}
