use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::models::{SpeedReading, TmcRecord};

pub mod atspm;

/// Timestamp layout used for every text timestamp column
pub const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tmc_data_detailed (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        intersection_id TEXT NOT NULL,
        date DATE NOT NULL,
        time TEXT NOT NULL,
        direction TEXT NOT NULL,
        movement TEXT NOT NULL,
        volume INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_tmc_intersection_date
        ON tmc_data_detailed(intersection_id, date)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS split_fail_phases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        phase_type TEXT,
        total_split_fails INTEGER,
        approach_id INTEGER,
        approach_description TEXT,
        location_identifier TEXT NOT NULL,
        location_description TEXT,
        date DATE NOT NULL,
        UNIQUE(phase_number, approach_id, location_identifier, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS split_fail_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        approach_id INTEGER,
        approach_description TEXT,
        location_identifier TEXT NOT NULL,
        date DATE NOT NULL,
        plan_number TEXT NOT NULL,
        plan_description TEXT,
        total_cycles INTEGER,
        fails_in_plan INTEGER,
        percent_fails REAL,
        plan_start TEXT NOT NULL,
        plan_end TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS split_fail_occupancy (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        approach_id INTEGER,
        location_identifier TEXT NOT NULL,
        date DATE NOT NULL,
        data_type TEXT NOT NULL,
        value REAL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pcd_phases (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        phase_description TEXT,
        location_identifier TEXT NOT NULL,
        location_description TEXT,
        total_on_green_events INTEGER,
        total_detector_hits INTEGER,
        percent_arrival_on_green REAL,
        date DATE NOT NULL,
        UNIQUE(phase_number, location_identifier, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pcd_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        location_identifier TEXT NOT NULL,
        date DATE NOT NULL,
        plan_number TEXT NOT NULL,
        plan_description TEXT,
        percent_green_time REAL,
        percent_arrival_on_green REAL,
        platoon_ratio REAL,
        plan_start TEXT NOT NULL,
        plan_end TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pcd_volume_per_hour (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        location_identifier TEXT NOT NULL,
        date DATE NOT NULL,
        value REAL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS split_monitor_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        phase_description TEXT,
        location_identifier TEXT NOT NULL,
        date DATE NOT NULL,
        plan_number TEXT NOT NULL,
        plan_description TEXT,
        plan_start TEXT NOT NULL,
        plan_end TEXT NOT NULL,
        percent_skips REAL,
        percent_gap_outs REAL,
        percent_max_outs REAL,
        percent_force_offs REAL,
        average_split REAL,
        programmed_split REAL,
        percentile_split_50th REAL,
        percentile_split_85th REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS split_monitor_splits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_number INTEGER NOT NULL,
        location_identifier TEXT NOT NULL,
        date DATE NOT NULL,
        series TEXT NOT NULL,
        value REAL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clearguide_avg_speed (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        route_id INTEGER NOT NULL,
        timestamp DATETIME NOT NULL,
        avg_speed REAL,
        UNIQUE(route_id, timestamp)
    )
    "#,
];

/// SQLite store for scraped signal, count and speed data
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (creating if needed) the database file and ensure the schema exists
    pub async fn new(database_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true),
            )
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        info!("🗄️  Database ready at {}", database_path);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert parsed TMC rows for one intersection-day in a single transaction
    pub async fn insert_tmc_records(&self, records: &[TmcRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO tmc_data_detailed (intersection_id, date, time, direction, movement, volume)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.intersection_id)
            .bind(record.date)
            .bind(&record.time)
            .bind(&record.direction)
            .bind(&record.movement)
            .bind(record.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("Inserted {} TMC rows", records.len());
        Ok(records.len())
    }

    /// All TMC rows, optionally limited to one intersection, in insertion order
    pub async fn get_tmc_records(&self, intersection_id: Option<&str>) -> Result<Vec<TmcRecord>> {
        let records = sqlx::query_as::<_, TmcRecord>(
            r#"
            SELECT intersection_id, date, time, direction, movement, volume
            FROM tmc_data_detailed
            WHERE (? IS NULL OR intersection_id = ?)
            ORDER BY id
            "#,
        )
        .bind(intersection_id)
        .bind(intersection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Upsert ClearGuide speed samples keyed by (route, timestamp)
    pub async fn insert_speed_readings(&self, readings: &[SpeedReading]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for reading in readings {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO clearguide_avg_speed (route_id, timestamp, avg_speed)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(reading.route_id)
            .bind(reading.timestamp)
            .bind(reading.avg_speed)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(readings.len())
    }

    pub async fn get_speed_readings(&self, route_id: i64) -> Result<Vec<SpeedReading>> {
        let readings = sqlx::query_as::<_, SpeedReading>(
            "SELECT route_id, timestamp, avg_speed FROM clearguide_avg_speed WHERE route_id = ? ORDER BY timestamp",
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(readings)
    }

    /// Row counts per table
    pub async fn get_stats(&self) -> Result<HashMap<String, i64>> {
        const TABLES: [&str; 10] = [
            "tmc_data_detailed",
            "split_fail_phases",
            "split_fail_plans",
            "split_fail_occupancy",
            "pcd_phases",
            "pcd_plans",
            "pcd_volume_per_hour",
            "split_monitor_plans",
            "split_monitor_splits",
            "clearguide_avg_speed",
        ];

        let mut stats = HashMap::new();
        for table in TABLES {
            let row = sqlx::query(&format!("SELECT COUNT(*) as count FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            stats.insert(table.to_string(), row.get::<i64, _>("count"));
        }
        Ok(stats)
    }

    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
