// Copyright 2026 Pillar Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pillar runtime library — four-pillar chart acquisition.
//!
//! Charts are computed locally by [`calendar::CalendarConversionEngine`] or
//! obtained from an external calculation service by
//! [`agent::RemoteAcquisitionAgent`]; [`orchestrator::AcquisitionOrchestrator`]
//! combines both with the daily [`cache::ReferenceMomentCache`].

pub mod agent;
pub mod automation;
pub mod cache;
pub mod calendar;
pub mod chart;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use chart::{FourPillarSet, Pillar};
pub use error::{AcquisitionError, AcquisitionResult};
