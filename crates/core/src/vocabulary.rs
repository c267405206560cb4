//! Domain vocabularies and the immutable lookup tables built from them at startup.
//!
//! [`Vocabulary::load`] registers every code enum and parses the packaged medication frequency
//! table. The result is shared read-only (`Arc<Vocabulary>`) by the classifier and the rule
//! functions; nothing mutates it after startup.

use crate::codes::{external_codes, CodeRegistry};
use crate::constants::BUNDLED_FREQUENCIES_YAML;
use crate::{EngineError, EngineResult};
use chrono::Duration;
use serde::Deserialize;
use std::collections::HashMap;

external_codes! {
    /// Event category codes understood by the engine.
    pub enum ObservationCode in "observation code" {
        PlateletCount => "PLT",
        Inr => "INR",
        Aptt => "APTT",
        DosingWeight => "WT_DOSING",
        ClinicalWeight => "WT_CLINICAL",
        AdmissionWeight => "WT_ADMIT",
        Height => "HT",
        Rass => "RASS",
        PainScore => "PAIN_SCORE",
        CamIcu => "CAM_ICU",
        Mobility => "MOBILITY_LEVEL",
        HeadOfBedAngle => "HOB_ANGLE",
        AwakeningTrial => "SAT",
        BreathingTrial => "SBT",
        CentralLine => "CENTRAL_LINE",
        LineNecessity => "LINE_NECESSITY",
        CatheterNecessity => "FOLEY_NECESSITY",
        CareTeamIntroduced => "CARE_TEAM_INTRO",
        FamilyEngaged => "FAMILY_ENGAGED",
        CodeStatus => "CODE_STATUS",
        GoalsDiscussed => "GOC_DISCUSSED",
        VteProphylaxisGiven => "VTE_PROPH_ADMIN",
        EncounterStatus => "ENC_STATUS",
    }
}

external_codes! {
    /// Encounter lifecycle transitions carried by `ENC_STATUS` events.
    pub enum EncounterStatusCode in "encounter status" {
        Admitted => "ADMITTED",
        Transferred => "TRANSFERRED",
        Discharged => "DISCHARGED",
        Withdrawn => "WITHDRAWN",
        Deceased => "DECEASED",
    }
}

impl EncounterStatusCode {
    /// Terminal transitions end the encounter and remove its document.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Discharged | Self::Withdrawn | Self::Deceased)
    }
}

external_codes! {
    /// Resuscitation status.
    pub enum CodeStatus in "code status" {
        FullCode => "FULL",
        DoNotResuscitate => "DNR",
        DoNotResuscitateOrIntubate => "DNR_DNI",
        ComfortMeasuresOnly => "CMO",
    }
}

external_codes! {
    /// CAM-ICU screening outcome.
    pub enum DeliriumResult in "delirium result" {
        Positive => "POS",
        Negative => "NEG",
        UnableToAssess => "UTA",
    }
}

external_codes! {
    /// Highest mobility achieved, ordered from least to most mobile.
    pub enum MobilityLevel in "mobility level" {
        Bedbound => "BED",
        SitEdgeOfBed => "SIT",
        Stand => "STAND",
        MarchInPlace => "MARCH",
        Ambulate => "AMBULATE",
    }
}

external_codes! {
    /// Procedures tracked in the encounter context.
    pub enum ProcedureCode in "procedure code" {
        MechanicalVentilation => "MECH_VENT",
        UrinaryCatheter => "FOLEY",
        SequentialCompression => "SCD",
    }
}

external_codes! {
    /// Therapeutic classes of ordered medications.
    pub enum MedicationClass in "medication class" {
        VteProphylaxis => "ANTICOAG_PROPH",
        SedativeInfusion => "SEDATIVE_INFUSION",
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FrequencyFile {
    frequencies: Vec<FrequencyEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FrequencyEntry {
    code: String,
    interval_minutes: i64,
}

/// Immutable `frequency code -> dosing interval` table.
#[derive(Clone, Debug, Default)]
pub struct FrequencyTable {
    intervals: HashMap<String, Duration>,
}

impl FrequencyTable {
    /// Parse a frequency table from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FrequencyTable`] if the YAML does not match the schema and
    /// [`EngineError::FrequencyEntry`] for blank codes, duplicate codes or non-positive
    /// intervals.
    pub fn from_yaml(yaml_text: &str) -> EngineResult<Self> {
        let file: FrequencyFile = serde_yaml::from_str(yaml_text)?;
        let mut intervals = HashMap::with_capacity(file.frequencies.len());

        for entry in file.frequencies {
            let code = entry.code.trim().to_ascii_uppercase();
            if code.is_empty() {
                return Err(EngineError::FrequencyEntry {
                    code: entry.code,
                    reason: "code cannot be blank".into(),
                });
            }
            let interval = Duration::try_minutes(entry.interval_minutes)
                .filter(|interval| *interval > Duration::zero());
            let Some(interval) = interval else {
                return Err(EngineError::FrequencyEntry {
                    code,
                    reason: format!(
                        "interval must be positive and in range, got {}",
                        entry.interval_minutes
                    ),
                });
            };
            if intervals.insert(code.clone(), interval).is_some()
            {
                return Err(EngineError::FrequencyEntry {
                    code,
                    reason: "listed more than once".into(),
                });
            }
        }

        Ok(Self { intervals })
    }

    /// The table packaged with the engine.
    pub fn bundled() -> EngineResult<Self> {
        Self::from_yaml(BUNDLED_FREQUENCIES_YAML)
    }

    /// Dosing interval for a frequency code (case-insensitive).
    pub fn interval(&self, frequency_code: &str) -> Option<Duration> {
        self.intervals
            .get(&frequency_code.trim().to_ascii_uppercase())
            .copied()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// Every startup-built lookup table the engine reads.
#[derive(Debug)]
pub struct Vocabulary {
    pub observations: CodeRegistry<ObservationCode>,
    pub encounter_statuses: CodeRegistry<EncounterStatusCode>,
    pub code_statuses: CodeRegistry<CodeStatus>,
    pub delirium_results: CodeRegistry<DeliriumResult>,
    pub mobility_levels: CodeRegistry<MobilityLevel>,
    pub procedures: CodeRegistry<ProcedureCode>,
    pub medication_classes: CodeRegistry<MedicationClass>,
    pub frequencies: FrequencyTable,
}

impl Vocabulary {
    /// Register every vocabulary and load the bundled frequency table.
    ///
    /// Any error here is a configuration error and should abort startup.
    pub fn load() -> EngineResult<Self> {
        Self::with_frequencies(FrequencyTable::bundled()?)
    }

    pub fn with_frequencies(frequencies: FrequencyTable) -> EngineResult<Self> {
        let vocabulary = Self {
            observations: CodeRegistry::register()?,
            encounter_statuses: CodeRegistry::register()?,
            code_statuses: CodeRegistry::register()?,
            delirium_results: CodeRegistry::register()?,
            mobility_levels: CodeRegistry::register()?,
            procedures: CodeRegistry::register()?,
            medication_classes: CodeRegistry::register()?,
            frequencies,
        };
        tracing::info!(
            observation_codes = vocabulary.observations.len(),
            frequencies = vocabulary.frequencies.len(),
            "vocabulary loaded"
        );
        Ok(vocabulary)
    }
}
