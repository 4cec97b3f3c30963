//! Storage for ATSPM report API responses

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use super::{DatabaseManager, STORED_TIMESTAMP_FORMAT};
use crate::models::atspm::{
    strip_millis, PcdPhase, PcdPlanRow, SplitFailPhase, SplitFailPlanRow, SplitMonitorPhase, SplitMonitorPlanRow,
    TimedValue, VolumePerHourRow,
};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Insert a timestamped series. `bind_keys` binds the columns ahead of
/// `(name, value, timestamp)` in `sql`.
async fn insert_series<'q, F>(
    tx: &mut Transaction<'_, Sqlite>,
    sql: &'q str,
    bind_keys: F,
    name: &'q str,
    values: &'q [TimedValue],
) -> Result<usize>
where
    F: Fn(SqliteQuery<'q>) -> SqliteQuery<'q>,
{
    for value in values {
        bind_keys(sqlx::query(sql))
            .bind(name)
            .bind(value.value)
            .bind(strip_millis(&value.timestamp))
            .execute(&mut **tx)
            .await?;
    }
    Ok(values.len())
}

impl DatabaseManager {
    /// Store one split failure phase for a day, replacing anything stored
    /// earlier for the same phase, approach, location and day.
    pub async fn save_split_fail_phase(&self, date: NaiveDate, phase: &SplitFailPhase) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let location = phase.location_identifier.as_str();

        for table in ["split_fail_phases", "split_fail_plans", "split_fail_occupancy"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE phase_number = ? AND approach_id IS ? AND location_identifier = ? AND date = ?",
                table
            ))
            .bind(phase.phase_number)
            .bind(phase.approach_id)
            .bind(location)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO split_fail_phases (
                phase_number, phase_type, total_split_fails, approach_id, approach_description,
                location_identifier, location_description, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(phase.phase_number)
        .bind(&phase.phase_type)
        .bind(phase.total_split_fails)
        .bind(phase.approach_id)
        .bind(&phase.approach_description)
        .bind(location)
        .bind(&phase.location_description)
        .bind(date)
        .execute(&mut *tx)
        .await?;

        for plan in &phase.plans {
            sqlx::query(
                r#"
                INSERT INTO split_fail_plans (
                    phase_number, approach_id, approach_description, location_identifier, date,
                    plan_number, plan_description, total_cycles, fails_in_plan, percent_fails,
                    plan_start, plan_end
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(phase.phase_number)
            .bind(phase.approach_id)
            .bind(&phase.approach_description)
            .bind(location)
            .bind(date)
            .bind(&plan.plan_number)
            .bind(&plan.plan_description)
            .bind(plan.total_cycles)
            .bind(plan.fails_in_plan)
            .bind(plan.percent_fails)
            .bind(strip_millis(&plan.start))
            .bind(strip_millis(&plan.end))
            .execute(&mut *tx)
            .await?;
        }

        const OCCUPANCY_SQL: &str = r#"
            INSERT INTO split_fail_occupancy (
                phase_number, approach_id, location_identifier, date, data_type, value, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;
        let mut series_rows = 0;
        for (name, values) in phase.occupancy_series() {
            series_rows += insert_series(
                &mut tx,
                OCCUPANCY_SQL,
                |q| q.bind(phase.phase_number).bind(phase.approach_id).bind(location).bind(date),
                name,
                values,
            )
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Stored split failure phase {} at {} on {} ({} plans, {} occupancy rows)",
            phase.phase_number,
            location,
            date,
            phase.plans.len(),
            series_rows
        );
        Ok(())
    }

    /// Store one Purdue coordination diagram phase for a location and day
    pub async fn save_pcd_phase(&self, location: &str, date: NaiveDate, phase: &PcdPhase) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in ["pcd_plans", "pcd_volume_per_hour"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE phase_number = ? AND location_identifier = ? AND date = ?",
                table
            ))
            .bind(phase.phase_number)
            .bind(location)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO pcd_phases (
                phase_number, phase_description, location_identifier, location_description,
                total_on_green_events, total_detector_hits, percent_arrival_on_green, date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(phase.phase_number)
        .bind(&phase.phase_description)
        .bind(location)
        .bind(&phase.location_description)
        .bind(phase.total_on_green_events)
        .bind(phase.total_detector_hits)
        .bind(phase.percent_arrival_on_green)
        .bind(date)
        .execute(&mut *tx)
        .await?;

        for plan in &phase.plans {
            sqlx::query(
                r#"
                INSERT INTO pcd_plans (
                    phase_number, location_identifier, date, plan_number, plan_description,
                    percent_green_time, percent_arrival_on_green, platoon_ratio, plan_start, plan_end
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(phase.phase_number)
            .bind(location)
            .bind(date)
            .bind(&plan.plan_number)
            .bind(&plan.plan_description)
            .bind(plan.percent_green_time)
            .bind(plan.percent_arrival_on_green)
            .bind(plan.platoon_ratio)
            .bind(strip_millis(&plan.start))
            .bind(strip_millis(&plan.end))
            .execute(&mut *tx)
            .await?;
        }

        for value in &phase.volume_per_hour {
            sqlx::query(
                r#"
                INSERT INTO pcd_volume_per_hour (phase_number, location_identifier, date, value, timestamp)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(phase.phase_number)
            .bind(location)
            .bind(date)
            .bind(value.value)
            .bind(strip_millis(&value.timestamp))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Store one split monitor phase for a day, replacing earlier rows
    pub async fn save_split_monitor_phase(&self, date: NaiveDate, phase: &SplitMonitorPhase) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let location = phase.location_identifier.as_str();

        for table in ["split_monitor_plans", "split_monitor_splits"] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE phase_number = ? AND location_identifier = ? AND date = ?",
                table
            ))
            .bind(phase.phase_number)
            .bind(location)
            .bind(date)
            .execute(&mut *tx)
            .await?;
        }

        for plan in &phase.plans {
            sqlx::query(
                r#"
                INSERT INTO split_monitor_plans (
                    phase_number, phase_description, location_identifier, date, plan_number, plan_description,
                    plan_start, plan_end, percent_skips, percent_gap_outs, percent_max_outs, percent_force_offs,
                    average_split, programmed_split, percentile_split_50th, percentile_split_85th
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(phase.phase_number)
            .bind(&phase.phase_description)
            .bind(location)
            .bind(date)
            .bind(&plan.plan_number)
            .bind(&plan.plan_description)
            .bind(strip_millis(&plan.start))
            .bind(strip_millis(&plan.end))
            .bind(plan.percent_skips)
            .bind(plan.percent_gap_outs)
            .bind(plan.percent_max_outs)
            .bind(plan.percent_force_offs)
            .bind(plan.average_split)
            .bind(plan.programmed_split)
            .bind(plan.percentile_split_50th)
            .bind(plan.percentile_split_85th)
            .execute(&mut *tx)
            .await?;
        }

        const SPLIT_SQL: &str = r#"
            INSERT INTO split_monitor_splits (phase_number, location_identifier, date, series, value, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
        "#;
        for (name, values) in phase.split_series() {
            insert_series(
                &mut tx,
                SPLIT_SQL,
                |q| q.bind(phase.phase_number).bind(location).bind(date),
                name,
                values,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// PCD plans whose start falls inside `[start, end]`
    pub async fn get_pcd_plans_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<PcdPlanRow>> {
        let rows = sqlx::query_as::<_, PcdPlanRow>(
            r#"
            SELECT location_identifier, phase_number, plan_number, plan_description,
                   plan_start AS start, plan_end AS "end",
                   percent_arrival_on_green, percent_green_time, platoon_ratio
            FROM pcd_plans
            WHERE plan_start BETWEEN ? AND ?
            ORDER BY location_identifier, phase_number, plan_start
            "#,
        )
        .bind(start.format(STORED_TIMESTAMP_FORMAT).to_string())
        .bind(end.format(STORED_TIMESTAMP_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_pcd_plans(&self, location: Option<&str>) -> Result<Vec<PcdPlanRow>> {
        let rows = sqlx::query_as::<_, PcdPlanRow>(
            r#"
            SELECT location_identifier, phase_number, plan_number, plan_description,
                   plan_start AS start, plan_end AS "end",
                   percent_arrival_on_green, percent_green_time, platoon_ratio
            FROM pcd_plans
            WHERE (? IS NULL OR location_identifier = ?)
            ORDER BY location_identifier, phase_number, plan_start
            "#,
        )
        .bind(location)
        .bind(location)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_volume_per_hour(&self, location: Option<&str>) -> Result<Vec<VolumePerHourRow>> {
        let rows = sqlx::query_as::<_, VolumePerHourRow>(
            r#"
            SELECT location_identifier, phase_number, value, timestamp
            FROM pcd_volume_per_hour
            WHERE (? IS NULL OR location_identifier = ?)
            ORDER BY location_identifier, phase_number, timestamp
            "#,
        )
        .bind(location)
        .bind(location)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_split_monitor_plans(&self, location: &str, plan_number: &str) -> Result<Vec<SplitMonitorPlanRow>> {
        let rows = sqlx::query_as::<_, SplitMonitorPlanRow>(
            r#"
            SELECT location_identifier, plan_number, phase_number,
                   plan_start AS start, plan_end AS "end",
                   programmed_split, average_split, percentile_split_50th, percentile_split_85th,
                   percent_skips, percent_gap_outs, percent_max_outs, percent_force_offs
            FROM split_monitor_plans
            WHERE location_identifier = ? AND plan_number = ?
            ORDER BY plan_start
            "#,
        )
        .bind(location)
        .bind(plan_number)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_split_fail_plans(&self, location: &str, plan_number: &str) -> Result<Vec<SplitFailPlanRow>> {
        let rows = sqlx::query_as::<_, SplitFailPlanRow>(
            r#"
            SELECT location_identifier, plan_number, phase_number, approach_description, percent_fails,
                   plan_start AS start, plan_end AS "end"
            FROM split_fail_plans
            WHERE location_identifier = ? AND plan_number = ?
            ORDER BY plan_start
            "#,
        )
        .bind(location)
        .bind(plan_number)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
