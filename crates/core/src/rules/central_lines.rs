//! Central venous lines: which are in, for how long, and whether necessity was reviewed today.

use super::{daily_assessment, RuleInput};
use crate::document::{ActiveLine, CategoryValue, CentralLineEvidence};
use crate::event::ClinicalEvent;
use crate::vocabulary::ObservationCode;
use std::collections::BTreeMap;

/// Lines whose latest insertion/removal record leaves them in place at `input.now`.
///
/// Each line is tracked by the event `item_id`; the freshest record per line decides. Records
/// without an item id or without a period value are skipped.
pub fn active_central_lines(input: &RuleInput<'_>) -> Vec<ActiveLine> {
    let mut latest: BTreeMap<&str, &ClinicalEvent> = BTreeMap::new();
    for event in input.history.with_code(ObservationCode::CentralLine) {
        if event.effective_time > input.now {
            continue;
        }
        let Some(line_id) = event.item_id.as_deref() else {
            tracing::debug!(
                source_event_id = %event.source_event_id,
                "central line record without a line id"
            );
            continue;
        };
        // History order is freshest-last.
        latest.insert(line_id, event);
    }

    latest
        .into_iter()
        .filter_map(|(line_id, event)| {
            let (start, end) = event.value.as_period()?;
            let in_place = start <= input.now && end.map_or(true, |end| end > input.now);
            in_place.then(|| ActiveLine {
                line_id: line_id.to_string(),
                inserted_at: start,
            })
        })
        .collect()
}

pub fn central_lines(input: &RuleInput<'_>) -> CategoryValue {
    let active_lines = active_central_lines(input);
    let line_days = active_lines
        .iter()
        .map(|line| line.inserted_at)
        .min()
        .map(|inserted| input.calendar_days_since(inserted));
    let necessity_assessed =
        daily_assessment(input, ObservationCode::LineNecessity, !active_lines.is_empty());

    CategoryValue::CentralLines(CentralLineEvidence {
        active_lines,
        line_days,
        necessity_assessed,
    })
}
