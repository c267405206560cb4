//! VTE prophylaxis and the laboratory bleeding-risk flags that contraindicate it.

use super::{
    as_recorded, round_to, threshold_above, threshold_below, weight_by_precedence, RuleInput,
};
use crate::constants::{APTT_RATIO_THRESHOLD, INR_HIGH_THRESHOLD, PLATELET_LOW_THRESHOLD_PER_UL};
use crate::document::{CategoryValue, ThromboembolismEvidence, Tristate, VteProphylaxis};
use crate::units::platelets_per_ul;
use crate::vocabulary::{MedicationClass, ObservationCode, ProcedureCode};
use chrono::{DateTime, Duration, Utc};

/// Parses a `"low-high"` reference range such as `"25-35"` or `"25.0 - 35.0"`.
///
/// Returns `None` unless both bounds are finite numbers with `low <= high`.
pub fn parse_reference_range(text: &str) -> Option<(f64, f64)> {
    let (low, high) = text.trim().split_once('-')?;
    let low: f64 = low.trim().parse().ok()?;
    let high: f64 = high.trim().parse().ok()?;
    (low.is_finite() && high.is_finite() && low <= high).then_some((low, high))
}

/// Whether an aPTT `value` is strictly above the threshold multiple of the range's upper bound.
///
/// A missing or malformed range is never a positive finding.
pub fn aptt_ratio_exceeded(value: f64, reference_range: Option<&str>) -> bool {
    let Some(text) = reference_range else {
        tracing::debug!("aPTT result without a reference range");
        return false;
    };
    match parse_reference_range(text) {
        Some((_, high)) => value > APTT_RATIO_THRESHOLD * high,
        None => {
            tracing::warn!(range = text, "malformed aPTT reference range");
            false
        }
    }
}

fn elevated_aptt(input: &RuleInput<'_>) -> bool {
    input
        .history
        .freshest(ObservationCode::Aptt, &input.lab_window())
        .and_then(|event| {
            let value = event.value.as_number().filter(|v| v.is_finite())?;
            Some(aptt_ratio_exceeded(value, event.reference_range.as_deref()))
        })
        .unwrap_or(false)
}

fn prophylaxis(input: &RuleInput<'_>) -> VteProphylaxis {
    let pharmacological = input
        .context
        .orders_of_class(input.vocabulary, MedicationClass::VteProphylaxis)
        .any(|order| order.start <= input.now);
    let mechanical = input.context.has_open_procedure(
        input.vocabulary,
        ProcedureCode::SequentialCompression,
        input.now,
    );

    match (pharmacological, mechanical) {
        (true, true) => VteProphylaxis::Combined,
        (true, false) => VteProphylaxis::Pharmacological,
        (false, true) => VteProphylaxis::Mechanical,
        (false, false) => VteProphylaxis::Absent,
    }
}

/// Whether the next scheduled prophylaxis dose is later than its interval plus grace.
///
/// `NotApplicable` without an active scheduled prophylaxis order. With several orders the
/// shortest known interval applies. The clock starts at the last charted administration, or at
/// the order start if nothing has been given yet.
fn dose_overdue(input: &RuleInput<'_>) -> Tristate {
    let mut earliest_start: Option<DateTime<Utc>> = None;
    let mut interval: Option<Duration> = None;

    for order in input
        .context
        .orders_of_class(input.vocabulary, MedicationClass::VteProphylaxis)
        .filter(|order| order.start <= input.now)
    {
        let Some(code) = order.frequency_code.as_deref() else {
            continue;
        };
        match input.vocabulary.frequencies.interval(code) {
            Some(every) => {
                interval = Some(interval.map_or(every, |current| current.min(every)));
                earliest_start = Some(earliest_start.map_or(order.start, |s| s.min(order.start)));
            }
            None => tracing::debug!(
                order_id = %order.order_id,
                frequency = code,
                "unknown medication frequency"
            ),
        }
    }

    let (Some(interval), Some(order_start)) = (interval, earliest_start) else {
        return Tristate::NotApplicable;
    };

    let last_dose = input
        .history
        .with_code(ObservationCode::VteProphylaxisGiven)
        .filter(|event| event.effective_time <= input.now)
        .map(|event| event.effective_time)
        .max();
    let clock_start = last_dose.unwrap_or(order_start);

    // A deadline past the representable range is never reached.
    let deadline = clock_start
        .checked_add_signed(interval)
        .and_then(|due| due.checked_add_signed(input.config.dose_grace()));
    Tristate::from(deadline.is_some_and(|deadline| input.now > deadline))
}

pub fn thromboembolism(input: &RuleInput<'_>) -> CategoryValue {
    let labs = input.lab_window();

    CategoryValue::Thromboembolism(ThromboembolismEvidence {
        prophylaxis: prophylaxis(input),
        low_platelets: threshold_below(
            input,
            ObservationCode::PlateletCount,
            &labs,
            PLATELET_LOW_THRESHOLD_PER_UL,
            platelets_per_ul,
        ),
        elevated_inr: threshold_above(
            input,
            ObservationCode::Inr,
            &labs,
            INR_HIGH_THRESHOLD,
            as_recorded,
        ),
        elevated_aptt: elevated_aptt(input),
        dosing_weight_kg: weight_by_precedence(input, &input.since_admission())
            .map(|weight| round_to(weight.kg, 2)),
        prophylaxis_dose_overdue: dose_overdue(input),
    })
}
