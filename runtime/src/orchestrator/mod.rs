// Copyright 2026 Pillar Contributors
// SPDX-License-Identifier: Apache-2.0

//! Acquisition orchestrator — the entry point producing a subject chart and
//! the current-moment reference chart.
//!
//! The clock is sampled once per call; that instant is both the reference
//! moment and, through its civil date in the configured zone, the cache key.
//! A request straddling local midnight therefore stays on the day it started.

pub mod clock;

use crate::agent::form::{ChartForm, Sex};
use crate::agent::RemoteAcquisitionAgent;
use crate::cache::{CacheOutcome, ReferenceMomentCache};
use crate::calendar::{CalendarConversionEngine, CalendarMoment, DEFAULT_UTC_OFFSET_MINUTES};
use crate::chart::FourPillarSet;
use crate::error::{AcquisitionError, AcquisitionResult};
use clock::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// First year of the Republic era, which counts year 1 as 1912.
const REPUBLIC_ERA_OFFSET: i32 = 1911;

/// How charts are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Deterministic local conversion.
    Local,
    /// The external calculation service via browser automation.
    Remote,
}

/// The subject's birth data as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRequest {
    pub name: Option<String>,
    pub sex: Sex,
    /// Common-era year, or a Republic-era year when below 1911.
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl SubjectRequest {
    /// The common-era year. Republic-era years (1..1911) gain 1911.
    pub fn normalized_year(&self) -> AcquisitionResult<i32> {
        match self.year {
            y if y < 1 => Err(AcquisitionError::InvalidMoment(format!(
                "year {y} is neither a common-era nor a Republic-era year"
            ))),
            y if y < REPUBLIC_ERA_OFFSET => Ok(y + REPUBLIC_ERA_OFFSET),
            y => Ok(y),
        }
    }

    /// Validated civil moment in the given offset.
    pub fn moment(&self, utc_offset_minutes: i32) -> AcquisitionResult<CalendarMoment> {
        let moment = CalendarMoment::new(
            self.normalized_year()?,
            self.month,
            self.day,
            self.hour,
            self.minute,
        )
        .with_utc_offset(utc_offset_minutes);
        moment.validate()?;
        Ok(moment)
    }
}

/// Subject and reference charts of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPair {
    pub subject: FourPillarSet,
    pub reference: FourPillarSet,
    pub subject_moment: CalendarMoment,
    pub reference_moment: CalendarMoment,
    pub date_key: String,
    pub strategy: Strategy,
    /// True when the reference chart was served from the cache.
    pub reference_cached: bool,
}

/// Combines the engine, the remote agent and the reference cache.
pub struct AcquisitionOrchestrator {
    engine: CalendarConversionEngine,
    agent: Option<Arc<RemoteAcquisitionAgent>>,
    cache: Arc<ReferenceMomentCache>,
    clock: Arc<dyn Clock>,
    utc_offset_minutes: i32,
}

impl AcquisitionOrchestrator {
    /// A local-only orchestrator with a fresh cache.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: CalendarConversionEngine::new(),
            agent: None,
            cache: Arc::new(ReferenceMomentCache::new()),
            clock,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }

    pub fn with_agent(mut self, agent: Arc<RemoteAcquisitionAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ReferenceMomentCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Offset subject moments are interpreted in.
    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn cache(&self) -> &Arc<ReferenceMomentCache> {
        &self.cache
    }

    /// Produce both charts with the chosen strategy. Any failure aborts the
    /// whole call.
    pub async fn acquire(
        &self,
        subject: &SubjectRequest,
        strategy: Strategy,
    ) -> AcquisitionResult<ChartPair> {
        match strategy {
            Strategy::Local => self.acquire_local(subject),
            Strategy::Remote => self.acquire_remote(subject).await,
        }
    }

    /// Both charts from the local engine. Never touches the cache.
    pub fn acquire_local(&self, subject: &SubjectRequest) -> AcquisitionResult<ChartPair> {
        let (reference_moment, date_key) = self.reference_moment();
        let subject_moment = subject.moment(self.utc_offset_minutes)?;

        let subject_chart = self.engine.convert(&subject_moment)?;
        let reference = self.engine.convert(&reference_moment)?;

        Ok(ChartPair {
            subject: subject_chart,
            reference,
            subject_moment,
            reference_moment,
            date_key,
            strategy: Strategy::Local,
            reference_cached: false,
        })
    }

    async fn acquire_remote(&self, subject: &SubjectRequest) -> AcquisitionResult<ChartPair> {
        let agent = self.agent.as_ref().ok_or_else(|| {
            AcquisitionError::RemoteUnavailable("no browser automation configured".into())
        })?;

        let (reference_moment, date_key) = self.reference_moment();
        let subject_moment = subject.moment(self.utc_offset_minutes)?;

        let form = ChartForm::new(subject.name.as_deref(), subject.sex, subject_moment);
        let subject_chart = agent.acquire(&form).await?;

        let (reference, outcome) = self
            .cache
            .get_or_fill(&date_key, || async move {
                tracing::info!(%reference_moment, "acquiring reference chart");
                agent.acquire(&ChartForm::reference(reference_moment)).await
            })
            .await?;

        if outcome == CacheOutcome::Hit {
            tracing::info!(date_key = %date_key, %reference, "reference chart served from cache");
        }

        Ok(ChartPair {
            subject: subject_chart,
            reference,
            subject_moment,
            reference_moment,
            date_key,
            strategy: Strategy::Remote,
            reference_cached: outcome == CacheOutcome::Hit,
        })
    }

    fn reference_moment(&self) -> (CalendarMoment, String) {
        let moment = CalendarMoment::from_datetime(&self.clock.now());
        let key = moment.date_key();
        (moment, key)
    }
}
