//! Care team introduction and family engagement.

use super::{freshest_flag, RuleInput};
use crate::document::{CategoryValue, RespectDignityEvidence};
use crate::vocabulary::ObservationCode;

/// Care-team introduction is once per stay; family engagement is checked daily.
pub fn respect_dignity(input: &RuleInput<'_>) -> CategoryValue {
    CategoryValue::RespectDignity(RespectDignityEvidence {
        care_team_introduced: freshest_flag(
            input,
            ObservationCode::CareTeamIntroduced,
            &input.since_admission(),
        ),
        family_engaged: freshest_flag(
            input,
            ObservationCode::FamilyEngaged,
            &input.assessment_day(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::document::Tristate;
    use crate::event::ClinicalValue;

    #[test]
    fn introduction_persists_but_engagement_resets_daily() {
        let fixture = Fixture::new(
            vec![
                event("CARE_TEAM_INTRO", ClinicalValue::Boolean(true), at(1, 9, 0)),
                event("FAMILY_ENGAGED", ClinicalValue::Boolean(true), at(1, 15, 0)),
            ],
            context(),
        );

        let expected_today = CategoryValue::RespectDignity(RespectDignityEvidence {
            care_team_introduced: Tristate::Yes,
            family_engaged: Tristate::Yes,
        });
        assert_eq!(respect_dignity(&fixture.input(at(1, 18, 0))), expected_today);

        let expected_tomorrow = CategoryValue::RespectDignity(RespectDignityEvidence {
            care_team_introduced: Tristate::Yes,
            family_engaged: Tristate::No,
        });
        assert_eq!(respect_dignity(&fixture.input(at(2, 8, 0))), expected_tomorrow);
    }

    #[test]
    fn freshest_flag_wins() {
        let fixture = Fixture::new(
            vec![
                event("FAMILY_ENGAGED", ClinicalValue::Boolean(true), at(1, 9, 0)),
                event("FAMILY_ENGAGED", ClinicalValue::Boolean(false), at(1, 11, 0)),
            ],
            context(),
        );
        let CategoryValue::RespectDignity(evidence) = respect_dignity(&fixture.input(at(1, 12, 0)))
        else {
            panic!("expected respect and dignity");
        };
        assert_eq!(evidence.family_engaged, Tristate::No);
    }
}
