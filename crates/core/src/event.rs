//! Clinical events and the de-duplicated, ordered history window that rules read.
//!
//! Events are produced and owned by the external event source; the engine only reads them.

use crate::codes::ExternalCode;
use crate::interval::{freshest_in, TimeWindow};
use crate::vocabulary::ObservationCode;
use chrono::{DateTime, Utc};
use harm_types::SourceEventId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The value carried by a clinical event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ClinicalValue {
    Quantity { value: f64, unit: String },
    Coded(String),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    /// Insertion/removal style records: an open period has no `end`.
    Period {
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    },
}

impl ClinicalValue {
    pub fn quantity(value: f64, unit: impl Into<String>) -> Self {
        Self::Quantity {
            value,
            unit: unit.into(),
        }
    }

    pub fn coded(code: impl Into<String>) -> Self {
        Self::Coded(code.into())
    }

    pub fn as_quantity(&self) -> Option<(f64, &str)> {
        match self {
            Self::Quantity { value, unit } => Some((*value, unit.as_str())),
            _ => None,
        }
    }

    /// Numeric reading, ignoring the unit.
    pub fn as_number(&self) -> Option<f64> {
        self.as_quantity().map(|(value, _)| value)
    }

    pub fn as_coded(&self) -> Option<&str> {
        match self {
            Self::Coded(code) => Some(code.as_str()),
            _ => None,
        }
    }

    /// Coded or free-text value, whichever is present.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Coded(text) | Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_period(&self) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>)> {
        match self {
            Self::Period { start, end } => Some((*start, *end)),
            _ => None,
        }
    }
}

/// One immutable clinical fact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicalEvent {
    /// External category code, resolved through the vocabulary.
    pub category_code: String,
    pub value: ClinicalValue,
    /// Instant the fact became true.
    pub effective_time: DateTime<Utc>,
    /// Instant the fact was captured.
    pub recorded_time: DateTime<Utc>,
    pub source_event_id: SourceEventId,
    /// Accompanying reference range text, e.g. `"25-35"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    /// Device or procedure instance the fact is about (for example a specific central line).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl ClinicalEvent {
    /// Creates an event recorded at the instant it became effective.
    pub fn new(
        category_code: impl Into<String>,
        value: ClinicalValue,
        effective_time: DateTime<Utc>,
        source_event_id: SourceEventId,
    ) -> Self {
        Self {
            category_code: category_code.into(),
            value,
            effective_time,
            recorded_time: effective_time,
            source_event_id,
            reference_range: None,
            item_id: None,
        }
    }

    pub fn recorded_at(mut self, recorded_time: DateTime<Utc>) -> Self {
        self.recorded_time = recorded_time;
        self
    }

    pub fn with_reference_range(mut self, range: impl Into<String>) -> Self {
        self.reference_range = Some(range.into());
        self
    }

    pub fn for_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn has_code(&self, code: ObservationCode) -> bool {
        self.category_code.trim() == code.code()
    }
}

/// The window of events one update cycle evaluates rules against.
///
/// Construction de-duplicates by `source_event_id` (first delivery kept) and orders events by
/// `(effective_time, recorded_time, source_event_id)`. The order is therefore a function of the
/// event set alone, never of the order storage happened to return it in, and "last in order"
/// among equal effective times means "most recently recorded".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventHistory {
    events: Vec<ClinicalEvent>,
}

impl EventHistory {
    pub fn new(events: impl IntoIterator<Item = ClinicalEvent>) -> Self {
        let mut seen: HashSet<SourceEventId> = HashSet::new();
        let mut events: Vec<ClinicalEvent> = events
            .into_iter()
            .filter(|event| seen.insert(event.source_event_id.clone()))
            .collect();

        events.sort_by(|a, b| {
            a.effective_time
                .cmp(&b.effective_time)
                .then_with(|| a.recorded_time.cmp(&b.recorded_time))
                .then_with(|| a.source_event_id.cmp(&b.source_event_id))
        });

        Self { events }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a history that also contains `event`, unless an event with the same
    /// `source_event_id` is already present.
    pub fn including(self, event: &ClinicalEvent) -> Self {
        if self
            .events
            .iter()
            .any(|e| e.source_event_id == event.source_event_id)
        {
            return self;
        }
        let mut events = self.events;
        events.push(event.clone());
        Self::new(events)
    }

    pub fn all(&self) -> &[ClinicalEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events carrying `code`, in history order.
    pub fn with_code(&self, code: ObservationCode) -> impl Iterator<Item = &ClinicalEvent> + '_ {
        self.events.iter().filter(move |event| event.has_code(code))
    }

    /// Freshest event carrying `code` whose effective time lies in `window`.
    pub fn freshest(&self, code: ObservationCode, window: &TimeWindow) -> Option<&ClinicalEvent> {
        freshest_in(self.with_code(code), window)
    }
}
