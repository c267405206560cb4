//! Ventilator bundle: head of bed, breathing trials and ventilator days.

use super::{as_recorded, daily_assessment, freshest_number, RuleInput};
use crate::constants::HEAD_OF_BED_MIN_DEGREES;
use crate::document::{CategoryValue, Tristate, VentilationEvidence};
use crate::vocabulary::{ObservationCode, ProcedureCode};

/// Ventilator bundle compliance, gated on an open mechanical-ventilation procedure.
pub fn ventilation(input: &RuleInput<'_>) -> CategoryValue {
    let Some(intubated) = input.context.earliest_open_start(
        input.vocabulary,
        ProcedureCode::MechanicalVentilation,
        input.now,
    ) else {
        return CategoryValue::Ventilation(VentilationEvidence::default());
    };

    let head_of_bed_elevated = Tristate::from(
        freshest_number(
            input,
            ObservationCode::HeadOfBedAngle,
            &input.vitals_window(),
            as_recorded,
        )
        .is_some_and(|degrees| degrees >= HEAD_OF_BED_MIN_DEGREES),
    );

    CategoryValue::Ventilation(VentilationEvidence {
        on_ventilator: Tristate::Yes,
        head_of_bed_elevated,
        awakening_trial: daily_assessment(input, ObservationCode::AwakeningTrial, true),
        breathing_trial: daily_assessment(input, ObservationCode::BreathingTrial, true),
        ventilator_days: Some(input.calendar_days_since(intubated)),
    })
}
