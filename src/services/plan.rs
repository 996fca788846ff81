// SPDX-License-Identifier: MIT

//! Training-plan text parsing and enhancement tracking.
//!
//! Plans arrive as pipe-delimited text, one day per line:
//!
//! ```text
//! 2025-03-01 | Easy Run | Conversational pace | 4 miles easy | 9:30-10:00/mi | 4 miles | 40
//! ```
//!
//! Malformed lines are skipped with a warning rather than failing the whole
//! plan. Parsing only fails when no line at all could be salvaged.

use crate::db::Db;
use crate::error::AppError;
use crate::models::TrainingDay;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

const MILES_TO_KM: f64 = 1.609344;

/// Fields expected on each plan line.
const PLAN_LINE_FIELDS: usize = 7;

/// Heading that opens each day block in enhanced plan markdown.
const DAY_BLOCK_MARKER: &str = "### Day";

/// Markers that must all be present for a day block to count as enhanced.
const ENHANCEMENT_MARKERS: [&str; 3] = ["Calories:", "Cadence:", "Heart Rate Zones:"];

/// How far along the detail-enhancement pass for a plan is.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnhancementProgress {
    pub enhanced: usize,
    pub total: usize,
    pub percentage: u32,
}

impl EnhancementProgress {
    fn from_counts(enhanced: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((enhanced as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            enhanced,
            total,
            percentage,
        }
    }
}

/// Parses plan text into stored training days and reports enhancement
/// progress.
#[derive(Clone)]
pub struct PlanService {
    db: Db,
}

impl PlanService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Parse `plan_text` and replace the stored days for `plan_id`.
    ///
    /// Returns the number of days stored.
    pub async fn parse(&self, plan_id: Uuid, plan_text: &str) -> Result<usize, AppError> {
        let days = parse_plan_text(plan_id, plan_text);

        if days.is_empty() {
            return Err(AppError::BadRequest(
                "No valid training days found in plan text".to_string(),
            ));
        }

        self.db.replace_training_days(plan_id, &days).await?;
        tracing::info!(plan_id = %plan_id, days = days.len(), "Training plan parsed");
        Ok(days.len())
    }

    /// Stored days for one plan, ordered by date.
    pub async fn get_days(&self, plan_id: Uuid) -> Result<Vec<TrainingDay>, AppError> {
        self.db.get_training_days(plan_id).await
    }

    /// Progress of the enhancement pass over `plan_text`.
    pub fn enhancement_progress(&self, plan_text: &str) -> EnhancementProgress {
        measure_enhancement(plan_text)
    }

    /// Progress computed on demand from the stored rows for a plan.
    pub async fn stored_progress(&self, plan_id: Uuid) -> Result<EnhancementProgress, AppError> {
        let days = self.db.get_training_days(plan_id).await?;
        let enhanced = days.iter().filter(|d| d.detailed_fields_generated).count();
        Ok(EnhancementProgress::from_counts(enhanced, days.len()))
    }
}

/// Parse each pipe-delimited line into a day, skipping unusable lines.
fn parse_plan_text(plan_id: Uuid, plan_text: &str) -> Vec<TrainingDay> {
    let mut days = Vec::new();

    for (line_no, line) in plan_text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || !line.contains('|') {
            continue;
        }

        match parse_plan_line(plan_id, line) {
            Ok(day) => days.push(day),
            Err(reason) => {
                tracing::warn!(line = line_no + 1, %reason, "Skipping unparseable plan line");
            }
        }
    }

    days
}

fn parse_plan_line(plan_id: Uuid, line: &str) -> Result<TrainingDay, String> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() != PLAN_LINE_FIELDS {
        return Err(format!(
            "expected {} fields, found {}",
            PLAN_LINE_FIELDS,
            fields.len()
        ));
    }

    let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
        .map_err(|e| format!("bad date '{}': {}", fields[0], e))?;

    Ok(TrainingDay {
        plan_id,
        date,
        session: fields[1].to_string(),
        description: normalize_field(fields[2]),
        mileage_breakdown: normalize_field(fields[3]),
        pace_targets: normalize_field(fields[4]),
        estimated_distance_km: parse_distance_km(fields[5]),
        estimated_time_minutes: parse_minutes(fields[6]),
        detailed_fields_generated: false,
        estimated_calories: None,
        target_cadence: None,
        heart_rate_zones: None,
    })
}

/// Placeholder values collapse to `None`.
fn is_placeholder(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("n/a") || raw == "0"
}

fn normalize_field(raw: &str) -> Option<String> {
    if is_placeholder(raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Distance field in kilometers. Accepts "4 miles", "6.4 km", or a bare
/// number (treated as kilometers).
fn parse_distance_km(raw: &str) -> Option<f64> {
    if is_placeholder(raw) {
        return None;
    }

    let lower = raw.to_lowercase();
    let numeric: String = lower
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = numeric.parse().ok()?;
    if value == 0.0 {
        return None;
    }

    let is_miles = lower.contains("mile") || (lower.contains("mi") && !lower.contains("min"));
    if is_miles {
        Some(value * MILES_TO_KM)
    } else {
        Some(value)
    }
}

fn parse_minutes(raw: &str) -> Option<i64> {
    if is_placeholder(raw) {
        return None;
    }
    let numeric: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    numeric.parse().ok().filter(|m| *m > 0)
}

/// Count day blocks and how many already carry all detail markers.
fn measure_enhancement(plan_text: &str) -> EnhancementProgress {
    let blocks: Vec<&str> = plan_text.split(DAY_BLOCK_MARKER).skip(1).collect();
    let enhanced = blocks
        .iter()
        .filter(|block| ENHANCEMENT_MARKERS.iter().all(|m| block.contains(m)))
        .count();

    EnhancementProgress::from_counts(enhanced, blocks.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_line(line: &str) -> Result<TrainingDay, String> {
        parse_plan_line(Uuid::nil(), line)
    }

    #[test]
    fn test_parse_full_line() {
        let day = parse_line(
            "2025-03-01 | Easy Run | Conversational pace | 2mi wu, 2mi easy | 9:30/mi | 4 miles | 40",
        )
        .unwrap();

        assert_eq!(day.date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(day.session, "Easy Run");
        assert_eq!(day.description.as_deref(), Some("Conversational pace"));
        assert_eq!(day.mileage_breakdown.as_deref(), Some("2mi wu, 2mi easy"));
        let km = day.estimated_distance_km.unwrap();
        assert!((km - 6.437376).abs() < 1e-6);
        assert_eq!(day.estimated_time_minutes, Some(40));
        assert!(!day.detailed_fields_generated);
    }

    #[test]
    fn test_short_line_rejected() {
        let err = parse_line("2025-03-01 | Easy Run | desc | breakdown | pace | 4 miles").unwrap_err();
        assert!(err.contains("expected 7 fields"));
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(parse_line("not-a-date | a | b | c | d | e | 40").is_err());
    }

    #[test]
    fn test_placeholders_become_none() {
        let day = parse_line("2025-03-02 | Rest | N/A | N/A | N/A | 0 | 0").unwrap();
        assert_eq!(day.description, None);
        assert_eq!(day.mileage_breakdown, None);
        assert_eq!(day.pace_targets, None);
        assert_eq!(day.estimated_distance_km, None);
        assert_eq!(day.estimated_time_minutes, None);
    }

    #[test]
    fn test_bare_number_distance_is_km() {
        let day = parse_line("2025-03-03 | Tempo | Steady effort | N/A | N/A | 8 | 45").unwrap();
        assert_eq!(day.estimated_distance_km, Some(8.0));
    }

    #[test]
    fn test_km_suffix() {
        let day = parse_line("2025-03-04 | Long Run | Slow | N/A | N/A | 16 km | 95").unwrap();
        assert_eq!(day.estimated_distance_km, Some(16.0));
    }

    #[test]
    fn test_skips_bad_lines_keeps_good_ones() {
        let text = "\
2025-03-01 | Easy Run | Conversational | N/A | N/A | 4 miles | 40
garbage line without pipes
2025-03-02 | Rest | off | N/A
2025-03-03 | Tempo | Steady | N/A | 8:00/mi | 6 miles | 50";

        let days = parse_plan_text(Uuid::nil(), text);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].session, "Easy Run");
        assert_eq!(days[1].session, "Tempo");
    }

    #[test]
    fn test_enhancement_two_of_three() {
        let text = "\
### Day 1
Calories: 450
Cadence: 170-180
Heart Rate Zones: Z2
### Day 2
Calories: 600
Cadence: 165-175
Heart Rate Zones: Z2-Z3
### Day 3
Rest day, nothing generated yet.";

        let progress = measure_enhancement(text);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.enhanced, 2);
        assert_eq!(progress.percentage, 67);
    }

    #[test]
    fn test_enhancement_partial_markers_do_not_count() {
        let text = "### Day 1\nCalories: 450\nCadence: 170";
        let progress = measure_enhancement(text);
        assert_eq!(progress.total, 1);
        assert_eq!(progress.enhanced, 0);
        assert_eq!(progress.percentage, 0);
    }

    #[test]
    fn test_enhancement_empty_plan() {
        let progress = measure_enhancement("");
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0);
    }

    #[tokio::test]
    async fn test_service_measures_plan_document() {
        let db = crate::db::Db::connect_in_memory().await.unwrap();
        let service = PlanService::new(db);

        let text = "\
### Day 1
Calories: 400
Cadence: 170-180
Heart Rate Zones: Z2
### Day 2
Still to be filled in.";

        let progress = service.enhancement_progress(text);
        assert_eq!(
            progress,
            EnhancementProgress {
                enhanced: 1,
                total: 2,
                percentage: 50,
            }
        );
    }
}
