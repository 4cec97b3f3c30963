//! ATSPM report API response types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Plan numbers come back as strings from some endpoints and integers from others
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// Timestamped value used by every chart series in the report API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
    pub value: Option<f64>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitFailPlan {
    pub total_cycles: Option<i64>,
    pub fails_in_plan: Option<i64>,
    pub percent_fails: Option<f64>,
    #[serde(deserialize_with = "string_or_number", default)]
    pub plan_number: String,
    pub start: String,
    pub end: String,
    pub plan_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitFailPhase {
    pub phase_number: i64,
    pub phase_type: Option<String>,
    pub total_split_fails: Option<i64>,
    pub approach_id: Option<i64>,
    pub approach_description: Option<String>,
    pub location_identifier: String,
    pub location_description: Option<String>,
    pub start: String,
    #[serde(default)]
    pub plans: Vec<SplitFailPlan>,
    #[serde(default)]
    pub gap_out_green_occupancies: Vec<TimedValue>,
    #[serde(default)]
    pub gap_out_red_occupancies: Vec<TimedValue>,
    #[serde(default)]
    pub force_off_green_occupancies: Vec<TimedValue>,
    #[serde(default)]
    pub force_off_red_occupancies: Vec<TimedValue>,
    #[serde(default)]
    pub average_gor: Vec<TimedValue>,
    #[serde(default)]
    pub average_ror: Vec<TimedValue>,
    #[serde(default)]
    pub percent_fails: Vec<TimedValue>,
}

impl SplitFailPhase {
    /// Occupancy series keyed by the name the API uses for them
    pub fn occupancy_series(&self) -> [(&'static str, &[TimedValue]); 7] {
        [
            ("gapOutGreenOccupancies", self.gap_out_green_occupancies.as_slice()),
            ("gapOutRedOccupancies", self.gap_out_red_occupancies.as_slice()),
            ("forceOffGreenOccupancies", self.force_off_green_occupancies.as_slice()),
            ("forceOffRedOccupancies", self.force_off_red_occupancies.as_slice()),
            ("averageGor", self.average_gor.as_slice()),
            ("averageRor", self.average_ror.as_slice()),
            ("percentFails", self.percent_fails.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcdPlan {
    pub percent_green_time: Option<f64>,
    pub percent_arrival_on_green: Option<f64>,
    pub platoon_ratio: Option<f64>,
    #[serde(deserialize_with = "string_or_number", default)]
    pub plan_number: String,
    pub start: String,
    pub end: String,
    pub plan_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcdPhase {
    pub phase_number: i64,
    pub phase_description: Option<String>,
    pub location_description: Option<String>,
    pub total_on_green_events: Option<i64>,
    pub total_detector_hits: Option<i64>,
    pub percent_arrival_on_green: Option<f64>,
    #[serde(default)]
    pub plans: Vec<PcdPlan>,
    #[serde(default)]
    pub volume_per_hour: Vec<TimedValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitMonitorPlan {
    #[serde(deserialize_with = "string_or_number", default)]
    pub plan_number: String,
    pub plan_description: Option<String>,
    pub start: String,
    pub end: String,
    pub percent_skips: Option<f64>,
    pub percent_gap_outs: Option<f64>,
    pub percent_max_outs: Option<f64>,
    pub percent_force_offs: Option<f64>,
    pub average_split: Option<f64>,
    pub programmed_split: Option<f64>,
    #[serde(rename = "percentileSplit50th")]
    pub percentile_split_50th: Option<f64>,
    #[serde(rename = "percentileSplit85th")]
    pub percentile_split_85th: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitMonitorPhase {
    pub phase_number: i64,
    pub phase_description: Option<String>,
    pub location_identifier: String,
    #[serde(default)]
    pub plans: Vec<SplitMonitorPlan>,
    #[serde(default)]
    pub programmed_splits: Vec<TimedValue>,
    #[serde(default)]
    pub gap_outs: Vec<TimedValue>,
    #[serde(default)]
    pub max_outs: Vec<TimedValue>,
    #[serde(default)]
    pub force_offs: Vec<TimedValue>,
    #[serde(default)]
    pub unknowns: Vec<TimedValue>,
}

impl SplitMonitorPhase {
    pub fn split_series(&self) -> [(&'static str, &[TimedValue]); 5] {
        [
            ("programmedSplits", self.programmed_splits.as_slice()),
            ("gapOuts", self.gap_outs.as_slice()),
            ("maxOuts", self.max_outs.as_slice()),
            ("forceOffs", self.force_offs.as_slice()),
            ("unknowns", self.unknowns.as_slice()),
        ]
    }
}

/// Split monitor plan statistics as stored, one row per phase and plan
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SplitMonitorPlanRow {
    pub location_identifier: String,
    pub plan_number: String,
    pub phase_number: i64,
    pub start: String,
    pub end: String,
    pub programmed_split: Option<f64>,
    pub average_split: Option<f64>,
    pub percentile_split_50th: Option<f64>,
    pub percentile_split_85th: Option<f64>,
    pub percent_skips: Option<f64>,
    pub percent_gap_outs: Option<f64>,
    pub percent_max_outs: Option<f64>,
    pub percent_force_offs: Option<f64>,
}

/// Split failure plan statistics as stored, with the approach of the owning phase
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SplitFailPlanRow {
    pub location_identifier: String,
    pub plan_number: String,
    pub phase_number: i64,
    pub approach_description: Option<String>,
    pub percent_fails: Option<f64>,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PcdPlanRow {
    pub location_identifier: String,
    pub phase_number: i64,
    pub plan_number: String,
    pub plan_description: Option<String>,
    pub start: String,
    pub end: String,
    pub percent_arrival_on_green: Option<f64>,
    pub percent_green_time: Option<f64>,
    pub platoon_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct VolumePerHourRow {
    pub location_identifier: String,
    pub phase_number: i64,
    pub value: Option<f64>,
    pub timestamp: String,
}

/// Strip fractional seconds from an API timestamp (`2024-10-19T06:00:00.123` → `2024-10-19T06:00:00`)
pub fn strip_millis(timestamp: &str) -> &str {
    timestamp.split('.').next().unwrap_or(timestamp)
}
