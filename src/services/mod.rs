// SPDX-License-Identifier: MIT

//! Service layer: provider integration, import, plan parsing, crypto.

pub mod audit;
pub mod crypto;
pub mod importer;
pub mod plan;
pub mod strava;

pub use crypto::TokenCipher;
pub use importer::{ImportService, ImportSummary};
pub use plan::{EnhancementProgress, PlanService};
pub use strava::{CallbackOutcome, StravaClient, StravaService};
