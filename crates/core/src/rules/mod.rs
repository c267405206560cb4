//! Per-category rule functions.
//!
//! A rule is a plain function `fn(&RuleInput) -> CategoryValue`: pure, total and independent of
//! every other rule. Missing or malformed data never fails a rule; it yields the category's
//! documented default and at most a diagnostic log line.
//!
//! Cross-cutting concerns wrap rules by composition ([`timed`]), never by layering types.

mod central_lines;
mod demographics;
mod goals_of_care;
mod mobility;
mod respect;
mod sedation;
mod thromboembolism;
mod urinary_catheter;
mod ventilation;

pub use central_lines::{active_central_lines, central_lines};
pub use demographics::{demographics, weight_by_precedence, WeightReading};
pub use goals_of_care::goals_of_care;
pub use mobility::mobility;
pub use respect::respect_dignity;
pub use sedation::{delirium, pain_agitation_sedation};
pub use thromboembolism::{aptt_ratio_exceeded, parse_reference_range, thromboembolism};
pub use urinary_catheter::urinary_catheter;
pub use ventilation::ventilation;

use crate::classifier::HarmCategory;
use crate::config::EngineConfig;
use crate::constants::ASSESSMENT_COMPLETED_VALUE;
use crate::context::EncounterContext;
use crate::document::{Assessment, CategoryValue, Tristate};
use crate::event::EventHistory;
use crate::interval::{daily_assessment_window, TimeWindow};
use crate::vocabulary::{ObservationCode, Vocabulary};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Everything a rule may read.
#[derive(Clone, Copy, Debug)]
pub struct RuleInput<'a> {
    pub history: &'a EventHistory,
    pub context: &'a EncounterContext,
    pub now: DateTime<Utc>,
    pub vocabulary: &'a Vocabulary,
    pub config: &'a EngineConfig,
}

impl RuleInput<'_> {
    pub fn since_admission(&self) -> TimeWindow {
        TimeWindow::since(self.context.admission_time)
    }

    /// Lab results younger than the configured lab lookback.
    pub fn lab_window(&self) -> TimeWindow {
        TimeWindow::lookback(self.now, self.config.lab_lookback())
    }

    /// Bedside scores younger than the configured vitals lookback.
    pub fn vitals_window(&self) -> TimeWindow {
        TimeWindow::lookback(self.now, self.config.vitals_lookback())
    }

    /// The assessment day `now` falls in.
    pub fn assessment_day(&self) -> TimeWindow {
        daily_assessment_window(
            self.now,
            &self.config.timezone(),
            self.config.daily_boundary_hour(),
        )
    }

    /// Calendar days (site-local) from `start` to now, counting the start day as day 1.
    pub fn calendar_days_since(&self, start: DateTime<Utc>) -> i64 {
        let zone = self.config.timezone();
        let start_day = start.with_timezone(&zone).date_naive();
        let today = self.now.with_timezone(&zone).date_naive();
        (today - start_day).num_days().max(0) + 1
    }
}

pub type RuleFn = fn(&RuleInput<'_>) -> CategoryValue;

/// The rule that computes `category`.
pub fn rule_for(category: HarmCategory) -> RuleFn {
    match category {
        HarmCategory::Demographics => demographics,
        HarmCategory::CentralLines => central_lines,
        HarmCategory::UrinaryCatheter => urinary_catheter,
        HarmCategory::PainAgitationSedation => pain_agitation_sedation,
        HarmCategory::Delirium => delirium,
        HarmCategory::Mobility => mobility,
        HarmCategory::Ventilation => ventilation,
        HarmCategory::Thromboembolism => thromboembolism,
        HarmCategory::RespectDignity => respect_dignity,
        HarmCategory::GoalsOfCare => goals_of_care,
    }
}

/// Wraps `rule` so each evaluation is traced with its elapsed time.
pub fn timed(
    category: HarmCategory,
    rule: RuleFn,
) -> impl Fn(&RuleInput<'_>) -> CategoryValue {
    move |input: &RuleInput<'_>| {
        let started = Instant::now();
        let value = rule(input);
        tracing::trace!(
            %category,
            encounter_id = %input.context.encounter_id,
            elapsed_us = started.elapsed().as_micros() as u64,
            "rule evaluated"
        );
        value
    }
}

/// Evaluate the rule for `category` with the standard middleware applied.
pub fn evaluate(category: HarmCategory, input: &RuleInput<'_>) -> CategoryValue {
    timed(category, rule_for(category))(input)
}

// ============================================================================
// Shared rule primitives
// ============================================================================

/// Normalises a raw `(value, unit)` reading; `None` means unusable.
pub type Normalise = fn(f64, &str) -> Option<f64>;

/// The numeric value of the freshest `code` reading in `window`, normalised.
///
/// Non-numeric values, unusable units and non-finite numbers all count as absent.
pub(crate) fn freshest_number(
    input: &RuleInput<'_>,
    code: ObservationCode,
    window: &TimeWindow,
    normalise: Normalise,
) -> Option<f64> {
    let event = input.history.freshest(code, window)?;
    let Some((raw, unit)) = event.value.as_quantity() else {
        tracing::debug!(
            ?code,
            source_event_id = %event.source_event_id,
            "freshest reading is not a quantity"
        );
        return None;
    };
    let value = normalise(raw, unit).filter(|v| v.is_finite());
    if value.is_none() {
        tracing::debug!(
            ?code,
            unit,
            source_event_id = %event.source_event_id,
            "freshest reading has an unusable unit"
        );
    }
    value
}

/// Rounds to `places` decimals so recomputed values compare equal across float noise.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Units are ignored; the reading is used as recorded.
pub(crate) fn as_recorded(value: f64, _unit: &str) -> Option<f64> {
    Some(value)
}

/// Freshest reading strictly below `threshold`. Absent reading → `false`.
pub(crate) fn threshold_below(
    input: &RuleInput<'_>,
    code: ObservationCode,
    window: &TimeWindow,
    threshold: f64,
    normalise: Normalise,
) -> bool {
    freshest_number(input, code, window, normalise).is_some_and(|value| value < threshold)
}

/// Freshest reading strictly above `threshold`. Absent reading → `false`.
pub(crate) fn threshold_above(
    input: &RuleInput<'_>,
    code: ObservationCode,
    window: &TimeWindow,
    threshold: f64,
    normalise: Normalise,
) -> bool {
    freshest_number(input, code, window, normalise).is_some_and(|value| value > threshold)
}

/// Freshest boolean `code` in `window`; absent or non-boolean → `No`.
pub(crate) fn freshest_flag(
    input: &RuleInput<'_>,
    code: ObservationCode,
    window: &TimeWindow,
) -> Tristate {
    input
        .history
        .freshest(code, window)
        .and_then(|event| event.value.as_bool())
        .map(Tristate::from)
        .unwrap_or(Tristate::No)
}

/// Daily check for `code` in today's assessment window.
///
/// `NotApplicable` when `applicable` is false (no qualifying active procedure), `Completed` when
/// an event recorded as "Completed" falls inside the window, otherwise `NotCompleted`.
pub(crate) fn daily_assessment(
    input: &RuleInput<'_>,
    code: ObservationCode,
    applicable: bool,
) -> Assessment {
    if !applicable {
        return Assessment::NotApplicable;
    }
    let window = input.assessment_day();
    let completed = input.history.with_code(code).any(|event| {
        window.contains(event.effective_time)
            && event
                .value
                .as_text()
                .is_some_and(|text| text.trim().eq_ignore_ascii_case(ASSESSMENT_COMPLETED_VALUE))
    });
    if completed {
        Assessment::Completed
    } else {
        Assessment::NotCompleted
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::event::ClinicalValue;

    #[test]
    fn every_rule_returns_its_own_category() {
        let fixture = Fixture::new(vec![], context());
        let input = fixture.input(at(2, 12, 0));
        for category in HarmCategory::ALL {
            assert_eq!(evaluate(category, &input).category(), category);
        }
    }

    #[test]
    fn daily_assessment_branches_on_boundary() {
        // Completed at 08:00 on the 4th.
        let fixture = Fixture::new(
            vec![event(
                "LINE_NECESSITY",
                ClinicalValue::Text("Completed".into()),
                at(4, 8, 0),
            )],
            context(),
        );

        // 06:59 on the 5th still belongs to the day that began 07:00 on the 4th.
        let before = fixture.input(at(5, 6, 59));
        assert_eq!(
            daily_assessment(&before, ObservationCode::LineNecessity, true),
            Assessment::Completed
        );

        // 07:01 on the 5th starts a new day with no assessment yet.
        let after = fixture.input(at(5, 7, 1));
        assert_eq!(
            daily_assessment(&after, ObservationCode::LineNecessity, true),
            Assessment::NotCompleted
        );

        assert_eq!(
            daily_assessment(&after, ObservationCode::LineNecessity, false),
            Assessment::NotApplicable
        );
    }

    #[test]
    fn daily_assessment_requires_completed_value() {
        let fixture = Fixture::new(
            vec![event(
                "SAT",
                ClinicalValue::Text("Deferred".into()),
                at(4, 9, 0),
            )],
            context(),
        );
        assert_eq!(
            daily_assessment(&fixture.input(at(4, 12, 0)), ObservationCode::AwakeningTrial, true),
            Assessment::NotCompleted
        );
    }

    #[test]
    fn calendar_days_count_start_day_as_one() {
        let fixture = Fixture::new(vec![], context());
        let input = fixture.input(at(4, 1, 0));
        assert_eq!(input.calendar_days_since(at(4, 0, 30)), 1);
        assert_eq!(input.calendar_days_since(at(2, 23, 0)), 3);
    }
}
