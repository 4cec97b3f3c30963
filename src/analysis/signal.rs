//! Signal performance rollups over stored ATSPM report data

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::models::atspm::{strip_millis, PcdPlanRow, SplitFailPlanRow, SplitMonitorPlanRow, VolumePerHourRow};
use crate::models::TmcRecord;
use crate::utils::{mean, parse_local_timestamp};

fn parse_api_time(value: &str) -> Option<NaiveDateTime> {
    parse_local_timestamp(strip_millis(value)).ok()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseAog {
    pub location_identifier: String,
    pub phase_number: i64,
    pub avg_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AogComparison {
    pub location_identifier: String,
    pub phase_number: i64,
    pub avg_percent_w1: f64,
    pub avg_percent_w2: f64,
    pub difference: f64,
}

/// Mean percent arrivals on green per location and phase
pub fn average_aog(rows: &[PcdPlanRow]) -> Vec<PhaseAog> {
    let mut groups: BTreeMap<(&str, i64), Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let Some(aog) = row.percent_arrival_on_green {
            groups
                .entry((row.location_identifier.as_str(), row.phase_number))
                .or_default()
                .push(aog);
        }
    }
    groups
        .into_iter()
        .filter_map(|((location, phase), values)| {
            mean(&values).map(|avg| PhaseAog {
                location_identifier: location.to_string(),
                phase_number: phase,
                avg_percent: avg,
            })
        })
        .collect()
}

/// Inner join of two windows on (location, phase); `difference = w2 - w1`
pub fn compare_aog(window1: &[PhaseAog], window2: &[PhaseAog]) -> Vec<AogComparison> {
    let second: HashMap<(&str, i64), f64> = window2
        .iter()
        .map(|p| ((p.location_identifier.as_str(), p.phase_number), p.avg_percent))
        .collect();

    window1
        .iter()
        .filter_map(|p| {
            let w2 = *second.get(&(p.location_identifier.as_str(), p.phase_number))?;
            Some(AogComparison {
                location_identifier: p.location_identifier.clone(),
                phase_number: p.phase_number,
                avg_percent_w1: p.avg_percent,
                avg_percent_w2: w2,
                difference: w2 - p.avg_percent,
            })
        })
        .collect()
}

/// Averaged split statistics for one phase, with its split failure rate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSplit {
    pub location_identifier: String,
    pub plan_number: String,
    pub phase_number: i64,
    pub programmed_split: Option<f64>,
    pub average_split: Option<f64>,
    pub percentile_split_50th: Option<f64>,
    pub percentile_split_85th: Option<f64>,
    pub percent_skips: Option<f64>,
    pub percent_gap_outs: Option<f64>,
    pub percent_force_offs: Option<f64>,
    pub approach_description: Option<String>,
    pub percent_fails: Option<f64>,
    pub perc_avg_split: Option<f64>,
    pub perc_prog_split: Option<f64>,
    pub perc_50th_split: Option<f64>,
    pub perc_85th_split: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitView {
    pub location_identifier: String,
    pub plan_number: String,
    pub cycle_length: Option<f64>,
    pub time_of_day: Vec<String>,
    pub phases: Vec<PhaseSplit>,
}

fn mean_of<T>(rows: &[&T], field: impl Fn(&T) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = rows.iter().filter_map(|r| field(r)).collect();
    mean(&values)
}

/// Overlap phases are reported under descriptions containing `Ov` or a parenthesis
fn is_overlap(description: &str) -> bool {
    description.contains("Ov") || description.contains('(')
}

/// Distinct `HH:MM - HH:MM` ranges covered by the plan rows, in first-seen order
pub fn plan_time_ranges(rows: &[SplitMonitorPlanRow]) -> Vec<String> {
    let mut ranges: Vec<String> = Vec::new();
    for row in rows {
        let (Some(start), Some(end)) = (parse_api_time(&row.start), parse_api_time(&row.end)) else {
            warn!("⚠️  Unparseable plan window {} - {}", row.start, row.end);
            continue;
        };
        let range = format!("{} - {}", start.format("%H:%M"), end.format("%H:%M"));
        if !ranges.contains(&range) {
            ranges.push(range);
        }
    }
    ranges
}

/// Build the split view for one location and plan.
///
/// Split monitor rows are averaged per phase and left-joined to split
/// failure rates averaged per phase and approach. The cycle length is half
/// the sum of the averaged programmed splits, since both rings are summed.
pub fn split_view(monitor: &[SplitMonitorPlanRow], fails: &[SplitFailPlanRow]) -> Option<SplitView> {
    let first = monitor.first()?;

    let mut by_phase: BTreeMap<i64, Vec<&SplitMonitorPlanRow>> = BTreeMap::new();
    for row in monitor {
        by_phase.entry(row.phase_number).or_default().push(row);
    }

    let mut fail_groups: BTreeMap<(i64, &str), Vec<f64>> = BTreeMap::new();
    for row in fails {
        let description = row.approach_description.as_deref().unwrap_or("");
        if is_overlap(description) {
            continue;
        }
        let entry = fail_groups.entry((row.phase_number, description)).or_default();
        if let Some(p) = row.percent_fails {
            entry.push(p);
        }
    }

    let averaged: Vec<(i64, [Option<f64>; 7])> = by_phase
        .iter()
        .map(|(phase, rows)| {
            (
                *phase,
                [
                    mean_of(rows, |r| r.programmed_split),
                    mean_of(rows, |r| r.average_split),
                    mean_of(rows, |r| r.percentile_split_50th),
                    mean_of(rows, |r| r.percentile_split_85th),
                    mean_of(rows, |r| r.percent_skips),
                    mean_of(rows, |r| r.percent_gap_outs),
                    mean_of(rows, |r| r.percent_force_offs),
                ],
            )
        })
        .collect();

    let programmed_total: f64 = averaged.iter().filter_map(|(_, v)| v[0]).sum();
    let cycle_length = (programmed_total > 0.0).then_some(programmed_total / 2.0);
    let pct = |v: Option<f64>| cycle_length.and_then(|c| v.map(|v| v / c * 100.0));

    let mut phases = Vec::new();
    for (phase, v) in averaged {
        let approaches: Vec<(Option<String>, Option<f64>)> = fail_groups
            .iter()
            .filter(|((p, _), _)| *p == phase)
            .map(|((_, d), values)| (Some(d.to_string()), mean(values)))
            .collect();
        let approaches = if approaches.is_empty() { vec![(None, None)] } else { approaches };

        for (approach_description, percent_fails) in approaches {
            phases.push(PhaseSplit {
                location_identifier: first.location_identifier.clone(),
                plan_number: first.plan_number.clone(),
                phase_number: phase,
                programmed_split: v[0],
                average_split: v[1],
                percentile_split_50th: v[2],
                percentile_split_85th: v[3],
                percent_skips: v[4],
                percent_gap_outs: v[5],
                percent_force_offs: v[6],
                approach_description,
                percent_fails,
                perc_avg_split: pct(v[1]),
                perc_prog_split: pct(v[0]),
                perc_50th_split: pct(v[2]),
                perc_85th_split: pct(v[3]),
            });
        }
    }

    debug!("Split view: {} phase rows, cycle {:?}", phases.len(), cycle_length);
    Some(SplitView {
        location_identifier: first.location_identifier.clone(),
        plan_number: first.plan_number.clone(),
        cycle_length,
        time_of_day: plan_time_ranges(monitor),
        phases,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanVolume {
    pub location_identifier: String,
    pub phase_number: i64,
    pub plan_number: String,
    pub plan_description: Option<String>,
    pub start: String,
    pub end: String,
    pub percent_arrival_on_green: Option<f64>,
    pub total_volume: f64,
}

/// Total volume inside each plan window.
///
/// Volume-per-hour samples are 15-minute bins expressed as hourly rates, so
/// the sum over `[start, end)` is divided by four.
pub fn plan_volumes(plans: &[PcdPlanRow], volumes: &[VolumePerHourRow]) -> Vec<PlanVolume> {
    let parsed: Vec<(&VolumePerHourRow, NaiveDateTime)> = volumes
        .iter()
        .filter_map(|v| parse_api_time(&v.timestamp).map(|t| (v, t)))
        .collect();

    plans
        .iter()
        .filter_map(|plan| {
            let start = parse_api_time(&plan.start)?;
            let end = parse_api_time(&plan.end)?;
            let sum: f64 = parsed
                .iter()
                .filter(|(v, t)| {
                    v.location_identifier == plan.location_identifier
                        && v.phase_number == plan.phase_number
                        && *t >= start
                        && *t < end
                })
                .filter_map(|(v, _)| v.value)
                .sum();
            Some(PlanVolume {
                location_identifier: plan.location_identifier.clone(),
                phase_number: plan.phase_number,
                plan_number: plan.plan_number.clone(),
                plan_description: plan.plan_description.clone(),
                start: plan.start.clone(),
                end: plan.end.clone(),
                percent_arrival_on_green: plan.percent_arrival_on_green,
                total_volume: sum / 4.0,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TmcDedupe {
    /// First occurrence of every distinct row, in input order
    pub kept: Vec<TmcRecord>,
    /// Every row belonging to a duplicated group, sorted by key
    pub duplicated: Vec<TmcRecord>,
}

/// Drop repeated TMC rows. Rows are duplicates when every field matches.
pub fn dedupe_tmc(records: &[TmcRecord]) -> TmcDedupe {
    let key = |r: &TmcRecord| {
        (
            r.intersection_id.clone(),
            r.date,
            r.time.clone(),
            r.direction.clone(),
            r.movement.clone(),
            r.volume,
        )
    };

    let mut counts: HashMap<_, usize> = HashMap::new();
    for r in records {
        *counts.entry(key(r)).or_default() += 1;
    }

    let mut seen = std::collections::HashSet::new();
    let mut result = TmcDedupe::default();
    for r in records {
        let k = key(r);
        if counts.get(&k).copied().unwrap_or(0) > 1 {
            result.duplicated.push(r.clone());
        }
        if seen.insert(k) {
            result.kept.push(r.clone());
        }
    }
    result.duplicated.sort_by(|a, b| key(a).cmp(&key(b)));
    result
}
