use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harm_core::config::{number_from_env_value, timezone_from_env_value};
use harm_core::constants::{
    DEFAULT_DAILY_BOUNDARY_HOUR, DEFAULT_DOSE_GRACE_MINUTES, DEFAULT_LAB_LOOKBACK_HOURS,
    DEFAULT_SWEEP_BATCH_SIZE, DEFAULT_SWEEP_PAUSE_MILLIS, DEFAULT_VITALS_LOOKBACK_HOURS,
};
use harm_core::{
    ClinicalEvent, ClinicalValue, Collaborators, EncounterContext, EngineConfig,
    HarmEvidenceService, InMemoryContexts, InMemoryDocumentRepository, InMemoryEventHistory,
    SweepPlan, SystemClock, UpdateTrigger, Vocabulary, run_sweep,
};
use harm_types::{EncounterId, SourceEventId};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Resolve engine configuration from the process environment.
///
/// # Environment Variables
/// - `HARM_TIMEZONE`: site IANA timezone, e.g. `Europe/London` (default: UTC)
/// - `HARM_DAY_START_HOUR`: local hour the assessment day starts (default: 7)
/// - `HARM_LAB_LOOKBACK_HOURS`: lab result lookback (default: 48)
/// - `HARM_VITALS_LOOKBACK_HOURS`: bedside score lookback (default: 12)
/// - `HARM_DOSE_GRACE_MINUTES`: grace before a dose counts as overdue (default: 60)
/// - `HARM_SWEEP_BATCH`: encounters per sweep batch (default: 50)
/// - `HARM_SWEEP_PAUSE_MS`: pause between sweep batches (default: 250)
fn config_from_env() -> anyhow::Result<EngineConfig> {
    let env = |name: &str| std::env::var(name).ok();

    let timezone = timezone_from_env_value(env("HARM_TIMEZONE"))?;
    let day_start = number_from_env_value(
        "HARM_DAY_START_HOUR",
        env("HARM_DAY_START_HOUR"),
        DEFAULT_DAILY_BOUNDARY_HOUR,
    )?;
    let lab_hours = number_from_env_value(
        "HARM_LAB_LOOKBACK_HOURS",
        env("HARM_LAB_LOOKBACK_HOURS"),
        DEFAULT_LAB_LOOKBACK_HOURS,
    )?;
    let vitals_hours = number_from_env_value(
        "HARM_VITALS_LOOKBACK_HOURS",
        env("HARM_VITALS_LOOKBACK_HOURS"),
        DEFAULT_VITALS_LOOKBACK_HOURS,
    )?;
    let grace_minutes = number_from_env_value(
        "HARM_DOSE_GRACE_MINUTES",
        env("HARM_DOSE_GRACE_MINUTES"),
        DEFAULT_DOSE_GRACE_MINUTES,
    )?;
    let batch = number_from_env_value(
        "HARM_SWEEP_BATCH",
        env("HARM_SWEEP_BATCH"),
        DEFAULT_SWEEP_BATCH_SIZE,
    )?;
    let pause_ms = number_from_env_value(
        "HARM_SWEEP_PAUSE_MS",
        env("HARM_SWEEP_PAUSE_MS"),
        DEFAULT_SWEEP_PAUSE_MILLIS,
    )?;

    let out_of_range = |name: &str| anyhow::anyhow!("{name} is out of range");
    let lab =
        Duration::try_hours(lab_hours).ok_or_else(|| out_of_range("HARM_LAB_LOOKBACK_HOURS"))?;
    let vitals = Duration::try_hours(vitals_hours)
        .ok_or_else(|| out_of_range("HARM_VITALS_LOOKBACK_HOURS"))?;
    let grace = Duration::try_minutes(grace_minutes)
        .ok_or_else(|| out_of_range("HARM_DOSE_GRACE_MINUTES"))?;

    Ok(EngineConfig::new(timezone, day_start)?
        .with_lookbacks(lab, vitals)?
        .with_dose_grace(grace)?
        .with_sweep(batch, StdDuration::from_millis(pause_ms))?)
}

/// Seed one encounter so a local run has something to sweep.
fn seed_demo_encounter(
    service: &HarmEvidenceService,
    history: &InMemoryEventHistory,
    contexts: &InMemoryContexts,
    encounter_id: EncounterId,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let admitted = now - Duration::hours(30);
    contexts.upsert(EncounterContext::new(encounter_id.clone(), "ICU-DEMO", admitted));

    let events = [
        ("demo-adt-1", "ENC_STATUS", ClinicalValue::coded("ADMITTED"), admitted),
        (
            "demo-wt-1",
            "WT_ADMIT",
            ClinicalValue::quantity(81.0, "kg"),
            admitted + Duration::minutes(20),
        ),
        (
            "demo-plt-1",
            "PLT",
            ClinicalValue::quantity(138.0, "10*3/uL"),
            now - Duration::hours(6),
        ),
        (
            "demo-rass-1",
            "RASS",
            ClinicalValue::quantity(-1.0, "score"),
            now - Duration::hours(1),
        ),
    ];

    for (id, code, value, effective) in events {
        let event = ClinicalEvent::new(code, value, effective, SourceEventId::new(id)?);
        history.append(&encounter_id, event.clone());
        let outcome = service.on_event(&event, &encounter_id)?;
        tracing::debug!(%encounter_id, source_event_id = id, ?outcome, "demo event applied");
    }

    tracing::info!(%encounter_id, "++ Seeded demo encounter");
    Ok(())
}

/// Main entry point for the harm evidence engine host
///
/// Loads configuration and vocabularies, wires the engine to in-memory collaborators and
/// refreshes the active census on a fixed interval until interrupted.
///
/// # Environment Variables
/// - `HARM_SWEEP_INTERVAL_SECS`: seconds between census sweeps (default: 300)
/// - `HARM_DEMO_ENCOUNTER`: if set, seed an encounter with this id at startup
/// - plus the engine settings listed on [`config_from_env`]
///
/// # Returns
/// * `Ok(())` - If the host shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration or vocabulary loading fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("harm=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(config_from_env()?);
    let vocabulary = Arc::new(Vocabulary::load()?);
    let interval_secs = number_from_env_value(
        "HARM_SWEEP_INTERVAL_SECS",
        std::env::var("HARM_SWEEP_INTERVAL_SECS").ok(),
        DEFAULT_SWEEP_INTERVAL_SECS,
    )?;

    let history = Arc::new(InMemoryEventHistory::new());
    let contexts = Arc::new(InMemoryContexts::new());
    let documents = Arc::new(InMemoryDocumentRepository::new());

    let service = Arc::new(HarmEvidenceService::new(
        config.clone(),
        vocabulary,
        Collaborators {
            history: history.clone(),
            contexts: contexts.clone(),
            documents: documents.clone(),
            clock: Arc::new(SystemClock),
        },
    ));

    if let Ok(raw) = std::env::var("HARM_DEMO_ENCOUNTER") {
        seed_demo_encounter(&service, &history, &contexts, EncounterId::new(raw)?)?;
    }

    tracing::info!(
        "++ Starting harm evidence sweeps every {}s (batch {}, timezone {})",
        interval_secs,
        config.sweep_batch_size(),
        config.timezone().name()
    );

    let mut ticker = tokio::time::interval(StdDuration::from_secs(interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let plan = SweepPlan::new(service.active_encounters(), config.sweep_batch_size())?;
                if plan.is_empty() {
                    tracing::debug!("no active encounters to sweep");
                    continue;
                }
                let service = Arc::clone(&service);
                let pause = config.sweep_pause();
                let report = tokio::task::spawn_blocking(move || {
                    run_sweep(service.as_ref(), &plan, pause)
                })
                .await?;
                if !report.failed.is_empty() {
                    tracing::warn!(
                        failed = report.failed.len(),
                        "some encounters failed to refresh; they will be retried next sweep"
                    );
                }
                tracing::info!(documents = documents.len(), "sweep finished");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("-- Shutting down");
                break;
            }
        }
    }

    Ok(())
}
