//! Weight, height and BMI.

use super::{freshest_number, round_to, RuleInput};
use crate::document::{CategoryValue, DemographicsEvidence, WeightSource};
use crate::event::ClinicalEvent;
use crate::interval::{first_is_fresher, TimeWindow};
use crate::units::{height_to_cm, weight_to_kg};
use crate::vocabulary::ObservationCode;
use chrono::{DateTime, Utc};

/// Weight sources from highest to lowest priority.
const WEIGHT_CHAIN: [(ObservationCode, WeightSource); 3] = [
    (ObservationCode::DosingWeight, WeightSource::Dosing),
    (ObservationCode::ClinicalWeight, WeightSource::Clinical),
    (ObservationCode::AdmissionWeight, WeightSource::Admission),
];

/// A weight chosen by [`weight_by_precedence`], already in kilograms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightReading {
    pub kg: f64,
    pub source: WeightSource,
    pub effective_time: DateTime<Utc>,
}

/// Patient weight from the dosing → clinical → admission chain.
///
/// Each source is compared with the next one down: a higher-priority weight wins when it is
/// fresher than or as fresh as that neighbour, otherwise the chain falls through. The selected
/// reading alone is converted to kilograms; if its unit is unusable the result is `None`.
pub fn weight_by_precedence(input: &RuleInput<'_>, window: &TimeWindow) -> Option<WeightReading> {
    let [dosing, clinical, admission] =
        WEIGHT_CHAIN.map(|(code, source)| (input.history.freshest(code, window), source));

    let (candidate, source) = [(dosing, clinical), (clinical, admission)]
        .into_iter()
        .find(|((higher, _), (next, _))| higher.is_some() && !first_is_fresher(*next, *higher))
        .map_or(admission, |(higher, _)| higher);
    let event: &ClinicalEvent = candidate?;

    let kg = event
        .value
        .as_quantity()
        .and_then(|(value, unit)| weight_to_kg(value, unit))
        .filter(|kg| kg.is_finite() && *kg > 0.0);

    if kg.is_none() {
        tracing::debug!(
            ?source,
            source_event_id = %event.source_event_id,
            "selected weight has no usable quantity"
        );
    }

    kg.map(|kg| WeightReading {
        kg,
        source,
        effective_time: event.effective_time,
    })
}

pub fn demographics(input: &RuleInput<'_>) -> CategoryValue {
    let window = input.since_admission();
    let weight = weight_by_precedence(input, &window);
    let height_cm = freshest_number(input, ObservationCode::Height, &window, height_to_cm)
        .filter(|cm| *cm > 0.0);

    let bmi = match (weight, height_cm) {
        (Some(weight), Some(cm)) => {
            let metres = cm / 100.0;
            Some(round_to(weight.kg / (metres * metres), 1))
        }
        _ => None,
    };

    CategoryValue::Demographics(DemographicsEvidence {
        weight_kg: weight.map(|w| round_to(w.kg, 2)),
        weight_source: weight.map(|w| w.source),
        height_cm: height_cm.map(|cm| round_to(cm, 1)),
        bmi,
    })
}
