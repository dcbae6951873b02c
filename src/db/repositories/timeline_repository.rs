use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, Row};
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::timeline::{TimelineItemCreate, TimelineItemRecord};
use crate::services::schedule_utils;

#[derive(Debug, Clone)]
pub struct TimelineItemRow {
    pub id: String,
    pub title: String,
    pub start_time: String,
    pub day: String,
    pub duration_minutes: i64,
    pub color: Option<String>,
    pub is_flexible: bool,
    pub plan_id: Option<String>,
    pub plan_task_id: Option<String>,
    pub created_at: String,
}

impl TimelineItemRow {
    /// Builds a new row with a fresh id. The `day` column is the date prefix
    /// of `start_time` and is what range queries filter on.
    pub fn from_create(input: &TimelineItemCreate) -> AppResult<Self> {
        let start = schedule_utils::parse_timestamp(&input.start_time)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title: input.title.clone(),
            start_time: input.start_time.clone(),
            day: schedule_utils::format_date(start.date()),
            duration_minutes: input.duration_minutes as i64,
            color: input.color.clone(),
            is_flexible: input.is_flexible,
            plan_id: input.plan_id.clone(),
            plan_task_id: input.plan_task_id.clone(),
            created_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn into_record(self) -> TimelineItemRecord {
        TimelineItemRecord {
            id: self.id,
            title: self.title,
            start_time: self.start_time,
            day: self.day,
            duration_minutes: self.duration_minutes.max(0) as u32,
            color: self.color,
            is_flexible: self.is_flexible,
            plan_id: self.plan_id,
            plan_task_id: self.plan_task_id,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<&Row<'_>> for TimelineItemRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            start_time: row.get("start_time")?,
            day: row.get("day")?,
            duration_minutes: row.get("duration_minutes")?,
            color: row.get("color")?,
            is_flexible: row.get::<_, i64>("is_flexible")? != 0,
            plan_id: row.get("plan_id")?,
            plan_task_id: row.get("plan_task_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        title,
        start_time,
        day,
        duration_minutes,
        color,
        is_flexible,
        plan_id,
        plan_task_id,
        created_at
    FROM timeline_items
"#;

pub struct TimelineRepository;

impl TimelineRepository {
    pub fn insert(conn: &Connection, row: &TimelineItemRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO timeline_items (
                    id,
                    title,
                    start_time,
                    day,
                    duration_minutes,
                    color,
                    is_flexible,
                    plan_id,
                    plan_task_id,
                    created_at
                ) VALUES (
                    :id,
                    :title,
                    :start_time,
                    :day,
                    :duration_minutes,
                    :color,
                    :is_flexible,
                    :plan_id,
                    :plan_task_id,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":title": &row.title,
                ":start_time": &row.start_time,
                ":day": &row.day,
                ":duration_minutes": &row.duration_minutes,
                ":color": &row.color,
                ":is_flexible": row.is_flexible as i64,
                ":plan_id": &row.plan_id,
                ":plan_task_id": &row.plan_task_id,
                ":created_at": &row.created_at,
            },
        )?;

        Ok(())
    }

    /// Items whose day is on or after `day` (`YYYY-MM-DD`).
    pub fn list_from_day(conn: &Connection, day: &str) -> AppResult<Vec<TimelineItemRow>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE day >= ?1 ORDER BY day ASC, start_time ASC"
        ))?;
        let rows = stmt
            .query_map([day], |row| TimelineItemRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_by_plan(conn: &Connection, plan_id: &str) -> AppResult<Vec<TimelineItemRow>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE plan_id = ?1 ORDER BY day ASC, start_time ASC"
        ))?;
        let rows = stmt
            .query_map([plan_id], |row| TimelineItemRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Returns the number of removed rows.
    pub fn delete_by_plan(conn: &Connection, plan_id: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM timeline_items WHERE plan_id = ?1", [plan_id])?;
        Ok(affected)
    }

    /// Swaps every stored item of `plan_id` for `rows`. Callers wrap this in a
    /// transaction. Returns the number of items that were replaced.
    pub fn replace_plan(
        conn: &Connection,
        plan_id: &str,
        rows: &[TimelineItemRow],
    ) -> AppResult<usize> {
        if let Some(row) = rows.iter().find(|row| row.plan_id.as_deref() != Some(plan_id)) {
            return Err(AppError::validation_with_details(
                "timeline item belongs to a different plan",
                json!({"planId": plan_id, "itemPlanId": row.plan_id}),
            ));
        }

        let replaced = Self::delete_by_plan(conn, plan_id)?;
        for row in rows {
            Self::insert(conn, row)?;
        }
        Ok(replaced)
    }
}
