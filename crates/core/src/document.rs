//! The harm evidence document: one per encounter, one independently stamped sub-record per harm
//! category.
//!
//! ## Invariants
//!
//! - A sub-record's `update_time` is the instant it was last (re)computed with a *different*
//!   value; recomputing an identical value leaves the stamp alone.
//! - `update_time` never goes backwards for a sub-record, even if the clock does.

use crate::classifier::HarmCategory;
use crate::vocabulary::{CodeStatus, MobilityLevel};
use crate::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use harm_types::EncounterId;
use serde::{Deserialize, Serialize};

// ============================================================================
// Shared field values
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tristate {
    Yes,
    No,
    NotApplicable,
}

impl From<bool> for Tristate {
    fn from(flag: bool) -> Self {
        if flag {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// Outcome of a daily check (necessity review, sedation holiday, screening).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Completed,
    NotCompleted,
    NotApplicable,
}

// ============================================================================
// Per-category sub-record values
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Dosing,
    Clinical,
    Admission,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicsEvidence {
    pub weight_kg: Option<f64>,
    pub weight_source: Option<WeightSource>,
    pub height_cm: Option<f64>,
    pub bmi: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLine {
    pub line_id: String,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentralLineEvidence {
    pub active_lines: Vec<ActiveLine>,
    /// Calendar days since the longest-standing active line went in (day of insertion = 1).
    pub line_days: Option<i64>,
    pub necessity_assessed: Assessment,
}

impl Default for CentralLineEvidence {
    fn default() -> Self {
        Self {
            active_lines: Vec::new(),
            line_days: None,
            necessity_assessed: Assessment::NotApplicable,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrinaryCatheterEvidence {
    pub catheter_present: Tristate,
    pub necessity_assessed: Assessment,
    pub catheter_days: Option<i64>,
}

impl Default for UrinaryCatheterEvidence {
    fn default() -> Self {
        Self {
            catheter_present: Tristate::NotApplicable,
            necessity_assessed: Assessment::NotApplicable,
            catheter_days: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SedationState {
    Deep,
    Light,
    Agitated,
    NotAssessed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SedationEvidence {
    pub rass_score: Option<i64>,
    pub sedation_state: SedationState,
    pub pain_score: Option<f64>,
    pub continuous_sedation: Tristate,
}

impl Default for SedationEvidence {
    fn default() -> Self {
        Self {
            rass_score: None,
            sedation_state: SedationState::NotAssessed,
            pain_score: None,
            continuous_sedation: Tristate::No,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliriumStatus {
    Positive,
    Negative,
    UnableToAssess,
    NotAssessed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliriumEvidence {
    pub cam_icu: DeliriumStatus,
    pub assessed: Assessment,
}

impl Default for DeliriumEvidence {
    fn default() -> Self {
        Self {
            cam_icu: DeliriumStatus::NotAssessed,
            assessed: Assessment::NotCompleted,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobilityEvidence {
    pub highest_level: Option<MobilityLevel>,
    pub assessed: Assessment,
}

impl Default for MobilityEvidence {
    fn default() -> Self {
        Self {
            highest_level: None,
            assessed: Assessment::NotCompleted,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VentilationEvidence {
    pub on_ventilator: Tristate,
    pub head_of_bed_elevated: Tristate,
    pub awakening_trial: Assessment,
    pub breathing_trial: Assessment,
    pub ventilator_days: Option<i64>,
}

impl Default for VentilationEvidence {
    fn default() -> Self {
        Self {
            on_ventilator: Tristate::NotApplicable,
            head_of_bed_elevated: Tristate::NotApplicable,
            awakening_trial: Assessment::NotApplicable,
            breathing_trial: Assessment::NotApplicable,
            ventilator_days: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VteProphylaxis {
    Pharmacological,
    Mechanical,
    Combined,
    Absent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThromboembolismEvidence {
    pub prophylaxis: VteProphylaxis,
    pub low_platelets: bool,
    pub elevated_inr: bool,
    pub elevated_aptt: bool,
    pub dosing_weight_kg: Option<f64>,
    pub prophylaxis_dose_overdue: Tristate,
}

impl ThromboembolismEvidence {
    /// Any laboratory bleeding-risk flag.
    pub fn bleeding_risk(&self) -> bool {
        self.low_platelets || self.elevated_inr || self.elevated_aptt
    }
}

impl Default for ThromboembolismEvidence {
    fn default() -> Self {
        Self {
            prophylaxis: VteProphylaxis::Absent,
            low_platelets: false,
            elevated_inr: false,
            elevated_aptt: false,
            dosing_weight_kg: None,
            prophylaxis_dose_overdue: Tristate::NotApplicable,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespectDignityEvidence {
    pub care_team_introduced: Tristate,
    pub family_engaged: Tristate,
}

impl Default for RespectDignityEvidence {
    fn default() -> Self {
        Self {
            care_team_introduced: Tristate::No,
            family_engaged: Tristate::No,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalsOfCareEvidence {
    pub code_status: Option<CodeStatus>,
    pub goals_discussed: Tristate,
}

impl Default for GoalsOfCareEvidence {
    fn default() -> Self {
        Self {
            code_status: None,
            goals_discussed: Tristate::No,
        }
    }
}

/// A freshly computed value for exactly one sub-record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "value", rename_all = "snake_case")]
pub enum CategoryValue {
    Demographics(DemographicsEvidence),
    CentralLines(CentralLineEvidence),
    UrinaryCatheter(UrinaryCatheterEvidence),
    PainAgitationSedation(SedationEvidence),
    Delirium(DeliriumEvidence),
    Mobility(MobilityEvidence),
    Ventilation(VentilationEvidence),
    Thromboembolism(ThromboembolismEvidence),
    RespectDignity(RespectDignityEvidence),
    GoalsOfCare(GoalsOfCareEvidence),
}

impl CategoryValue {
    pub fn category(&self) -> HarmCategory {
        match self {
            Self::Demographics(_) => HarmCategory::Demographics,
            Self::CentralLines(_) => HarmCategory::CentralLines,
            Self::UrinaryCatheter(_) => HarmCategory::UrinaryCatheter,
            Self::PainAgitationSedation(_) => HarmCategory::PainAgitationSedation,
            Self::Delirium(_) => HarmCategory::Delirium,
            Self::Mobility(_) => HarmCategory::Mobility,
            Self::Ventilation(_) => HarmCategory::Ventilation,
            Self::Thromboembolism(_) => HarmCategory::Thromboembolism,
            Self::RespectDignity(_) => HarmCategory::RespectDignity,
            Self::GoalsOfCare(_) => HarmCategory::GoalsOfCare,
        }
    }
}

// ============================================================================
// Document
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubRecord<T> {
    pub value: T,
    pub update_time: DateTime<Utc>,
}

/// What a merge did to the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First computation for this sub-record.
    Created,
    /// Value changed and was re-stamped.
    Updated,
    /// Value identical; nothing touched.
    Unchanged,
}

impl MergeOutcome {
    pub fn needs_write(self) -> bool {
        !matches!(self, MergeOutcome::Unchanged)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmEvidenceDocument {
    pub encounter_id: EncounterId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographics: Option<SubRecord<DemographicsEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub central_lines: Option<SubRecord<CentralLineEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urinary_catheter: Option<SubRecord<UrinaryCatheterEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pain_agitation_sedation: Option<SubRecord<SedationEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delirium: Option<SubRecord<DeliriumEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobility: Option<SubRecord<MobilityEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ventilation: Option<SubRecord<VentilationEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thromboembolism: Option<SubRecord<ThromboembolismEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respect_dignity: Option<SubRecord<RespectDignityEvidence>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals_of_care: Option<SubRecord<GoalsOfCareEvidence>>,
}

fn stamped<T: Clone>(slot: &Option<SubRecord<T>>) -> Option<(T, DateTime<Utc>)> {
    slot.as_ref()
        .map(|record| (record.value.clone(), record.update_time))
}

fn merge_slot<T: PartialEq>(
    slot: &mut Option<SubRecord<T>>,
    value: T,
    now: DateTime<Utc>,
    category: HarmCategory,
) -> MergeOutcome {
    match slot {
        Some(existing) if existing.value == value => MergeOutcome::Unchanged,
        Some(existing) => {
            if now < existing.update_time {
                tracing::warn!(
                    %category,
                    previous = %existing.update_time,
                    %now,
                    "clock behind previous update; keeping previous stamp"
                );
            } else {
                existing.update_time = now;
            }
            existing.value = value;
            MergeOutcome::Updated
        }
        None => {
            *slot = Some(SubRecord {
                value,
                update_time: now,
            });
            MergeOutcome::Created
        }
    }
}

impl HarmEvidenceDocument {
    pub fn new(encounter_id: EncounterId, created_at: DateTime<Utc>) -> Self {
        Self {
            encounter_id,
            created_at,
            demographics: None,
            central_lines: None,
            urinary_catheter: None,
            pain_agitation_sedation: None,
            delirium: None,
            mobility: None,
            ventilation: None,
            thromboembolism: None,
            respect_dignity: None,
            goals_of_care: None,
        }
    }

    fn stamped(&self, category: HarmCategory) -> Option<(CategoryValue, DateTime<Utc>)> {
        use CategoryValue as V;
        match category {
            HarmCategory::Demographics => {
                stamped(&self.demographics).map(|(v, t)| (V::Demographics(v), t))
            }
            HarmCategory::CentralLines => {
                stamped(&self.central_lines).map(|(v, t)| (V::CentralLines(v), t))
            }
            HarmCategory::UrinaryCatheter => {
                stamped(&self.urinary_catheter).map(|(v, t)| (V::UrinaryCatheter(v), t))
            }
            HarmCategory::PainAgitationSedation => stamped(&self.pain_agitation_sedation)
                .map(|(v, t)| (V::PainAgitationSedation(v), t)),
            HarmCategory::Delirium => stamped(&self.delirium).map(|(v, t)| (V::Delirium(v), t)),
            HarmCategory::Mobility => stamped(&self.mobility).map(|(v, t)| (V::Mobility(v), t)),
            HarmCategory::Ventilation => {
                stamped(&self.ventilation).map(|(v, t)| (V::Ventilation(v), t))
            }
            HarmCategory::Thromboembolism => {
                stamped(&self.thromboembolism).map(|(v, t)| (V::Thromboembolism(v), t))
            }
            HarmCategory::RespectDignity => {
                stamped(&self.respect_dignity).map(|(v, t)| (V::RespectDignity(v), t))
            }
            HarmCategory::GoalsOfCare => {
                stamped(&self.goals_of_care).map(|(v, t)| (V::GoalsOfCare(v), t))
            }
        }
    }

    /// Current value of one sub-record, if it has been computed.
    pub fn get(&self, category: HarmCategory) -> Option<CategoryValue> {
        self.stamped(category).map(|(value, _)| value)
    }

    pub fn update_time(&self, category: HarmCategory) -> Option<DateTime<Utc>> {
        self.stamped(category).map(|(_, time)| time)
    }

    /// Merge a freshly computed value into its sub-record.
    pub fn merge(&mut self, value: CategoryValue, now: DateTime<Utc>) -> MergeOutcome {
        let category = value.category();
        match value {
            CategoryValue::Demographics(v) => merge_slot(&mut self.demographics, v, now, category),
            CategoryValue::CentralLines(v) => merge_slot(&mut self.central_lines, v, now, category),
            CategoryValue::UrinaryCatheter(v) => {
                merge_slot(&mut self.urinary_catheter, v, now, category)
            }
            CategoryValue::PainAgitationSedation(v) => {
                merge_slot(&mut self.pain_agitation_sedation, v, now, category)
            }
            CategoryValue::Delirium(v) => merge_slot(&mut self.delirium, v, now, category),
            CategoryValue::Mobility(v) => merge_slot(&mut self.mobility, v, now, category),
            CategoryValue::Ventilation(v) => merge_slot(&mut self.ventilation, v, now, category),
            CategoryValue::Thromboembolism(v) => {
                merge_slot(&mut self.thromboembolism, v, now, category)
            }
            CategoryValue::RespectDignity(v) => {
                merge_slot(&mut self.respect_dignity, v, now, category)
            }
            CategoryValue::GoalsOfCare(v) => merge_slot(&mut self.goals_of_care, v, now, category),
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self).map_err(EngineError::Serialization)
    }

    pub fn from_json(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text).map_err(EngineError::Deserialization)
    }
}
