// SPDX-License-Identifier: MIT

//! Stride-Tracker: backend for a running-training web application.
//!
//! This crate provides the Strava OAuth connection and token-lifecycle
//! subsystem, the activity/stats importer, and the training-plan parsing
//! and enhancement-progress pipeline.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{ImportService, PlanService, StravaService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub strava_service: StravaService,
    pub import_service: ImportService,
    pub plan_service: PlanService,
}
