//! Code status and goals of care discussion.

use super::{freshest_flag, RuleInput};
use crate::document::{CategoryValue, GoalsOfCareEvidence};
use crate::vocabulary::ObservationCode;

/// Current code status and whether goals of care have been discussed this stay.
pub fn goals_of_care(input: &RuleInput<'_>) -> CategoryValue {
    let window = input.since_admission();
    let code_status = input
        .history
        .freshest(ObservationCode::CodeStatus, &window)
        .and_then(|event| {
            let status = event
                .value
                .as_text()
                .and_then(|value| input.vocabulary.code_statuses.lookup(value));
            if status.is_none() {
                tracing::debug!(
                    source_event_id = %event.source_event_id,
                    "unrecognised code status"
                );
            }
            status
        });

    CategoryValue::GoalsOfCare(GoalsOfCareEvidence {
        code_status,
        goals_discussed: freshest_flag(input, ObservationCode::GoalsDiscussed, &window),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::document::Tristate;
    use crate::event::ClinicalValue;
    use crate::vocabulary::CodeStatus;

    fn evidence(value: CategoryValue) -> GoalsOfCareEvidence {
        match value {
            CategoryValue::GoalsOfCare(evidence) => evidence,
            other => panic!("expected goals of care, got {other:?}"),
        }
    }

    #[test]
    fn latest_code_status_applies() {
        let fixture = Fixture::new(
            vec![
                event("CODE_STATUS", ClinicalValue::coded("FULL"), at(1, 2, 0)),
                event("CODE_STATUS", ClinicalValue::coded("DNR_DNI"), at(3, 16, 0)),
                event("GOC_DISCUSSED", ClinicalValue::Boolean(true), at(3, 15, 0)),
            ],
            context(),
        );

        let evidence = evidence(goals_of_care(&fixture.input(at(4, 9, 0))));
        assert_eq!(evidence.code_status, Some(CodeStatus::DoNotResuscitateOrIntubate));
        assert_eq!(evidence.goals_discussed, Tristate::Yes);
    }

    #[test]
    fn status_charted_before_admission_is_ignored() {
        let mut ctx = context();
        ctx.admission_time = at(2, 0, 0);
        let fixture = Fixture::new(
            vec![event("CODE_STATUS", ClinicalValue::coded("CMO"), at(1, 12, 0))],
            ctx,
        );
        assert_eq!(
            evidence(goals_of_care(&fixture.input(at(2, 9, 0)))),
            GoalsOfCareEvidence::default()
        );
    }

    #[test]
    fn unknown_status_value_is_absent() {
        let fixture = Fixture::new(
            vec![event("CODE_STATUS", ClinicalValue::coded("PARTIAL"), at(1, 2, 0))],
            context(),
        );
        assert_eq!(evidence(goals_of_care(&fixture.input(at(2, 9, 0)))).code_status, None);
    }
}
