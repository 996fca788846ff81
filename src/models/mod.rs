// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod activity;
pub mod plan;
pub mod user;

pub use activity::{BestEffort, ImportedActivity, StatTotals};
pub use plan::TrainingDay;
pub use user::{Profile, StravaTokenRecord};
