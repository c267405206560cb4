//! Half-open time windows and the "freshest matching event" selector.
//!
//! `TimeWindow::contains` includes its start and excludes its end. A measurement taken exactly
//! at a cutoff therefore belongs to the window that *starts* at the cutoff, never to the one that
//! ends there.

use crate::event::ClinicalEvent;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// Half-open interval `[start, end)` over instants.
///
/// A window with either bound unset contains nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Window with an effective lower bound and no practical upper bound.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self::new(start, DateTime::<Utc>::MAX_UTC)
    }

    /// Window covering everything from `span` before `now` onwards.
    ///
    /// A span reaching past the earliest representable instant starts at that instant.
    pub fn lookback(now: DateTime<Utc>, span: Duration) -> Self {
        Self::since(
            now.checked_sub_signed(span)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    /// Window that contains nothing.
    pub fn unset() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub fn from_bounds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start <= t && t < end,
            _ => false,
        }
    }
}

/// Freshest event in `events` whose effective time lies in `window`.
///
/// The greatest `effective_time` wins; among equal effective times the event that comes last in
/// input order wins.
pub fn freshest<'a>(events: &'a [ClinicalEvent], window: &TimeWindow) -> Option<&'a ClinicalEvent> {
    freshest_in(events, window)
}

/// [`freshest`] over any ordered sequence of event references.
pub fn freshest_in<'a, I>(events: I, window: &TimeWindow) -> Option<&'a ClinicalEvent>
where
    I: IntoIterator<Item = &'a ClinicalEvent>,
{
    let mut best: Option<&'a ClinicalEvent> = None;
    for event in events {
        if !window.contains(event.effective_time) {
            continue;
        }
        // A later element with an equal effective time replaces the earlier one.
        match best {
            Some(current) if event.effective_time < current.effective_time => {}
            _ => best = Some(event),
        }
    }
    best
}

/// Whether `a` is strictly fresher than `b`.
///
/// An absent event is older than any present one; two absent events are equal.
pub fn first_is_fresher(a: Option<&ClinicalEvent>, b: Option<&ClinicalEvent>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.effective_time > b.effective_time,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// The assessment day `now` falls in, for a day that starts at `boundary_hour` local time.
///
/// Before today's boundary the window is `[yesterday's boundary, today's boundary)`; from the
/// boundary onwards it is `[today's boundary, tomorrow's boundary)`. Each boundary is resolved on
/// its own local date, so a day spanning a daylight saving change is 23 or 25 hours long.
pub fn daily_assessment_window<Z: TimeZone>(
    now: DateTime<Utc>,
    zone: &Z,
    boundary_hour: u32,
) -> TimeWindow {
    let local_date = now.with_timezone(zone).date_naive();
    let boundary = |date: Option<NaiveDate>| date.and_then(|d| local_boundary(zone, d, boundary_hour));

    let Some(today) = boundary(Some(local_date)) else {
        tracing::warn!("cannot resolve daily boundary hour {boundary_hour} on {local_date}");
        return TimeWindow::unset();
    };

    if now < today {
        TimeWindow::from_bounds(boundary(local_date.pred_opt()), Some(today))
    } else {
        TimeWindow::from_bounds(Some(today), boundary(local_date.succ_opt()))
    }
}

/// `hour:00` local time on `date` as an instant.
///
/// An ambiguous local time (clocks going back) resolves to its earlier instant. A local time
/// skipped by clocks going forward moves forward by the hour that was skipped.
fn local_boundary<Z: TimeZone>(zone: &Z, date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    zone.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            let shifted = naive.checked_add_signed(Duration::hours(1))?;
            zone.from_local_datetime(&shifted).earliest()
        })
        .map(|local| local.with_timezone(&Utc))
}
