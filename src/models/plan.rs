use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::services::schedule_utils;

/// A unit of work to place on the calendar. Its duration is fixed by the user
/// and is only ever split into parts, never shortened or stretched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanTask {
    pub id: String,
    pub index: i64,
    pub title: String,
    pub user_defined_duration_minutes: u32,
    #[serde(default)]
    pub is_flexible: bool,
    #[serde(default)]
    pub color: Option<String>,
}

impl PlanTask {
    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::validation("task id must not be empty"));
        }
        if self.user_defined_duration_minutes == 0 {
            return Err(AppError::validation_with_details(
                "task duration must be positive",
                json!({"taskId": self.id, "title": self.title}),
            ));
        }
        Ok(())
    }
}

/// A busy interval already on the calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExistingItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub start_time: String,
    pub duration_minutes: u32,
}

fn default_working_hours_start() -> String {
    "09:00".to_string()
}

fn default_working_hours_end() -> String {
    "17:00".to_string()
}

fn default_max_minutes_per_day() -> u32 {
    480
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConfig {
    pub start_date: NaiveDate,
    #[serde(default = "default_working_hours_start")]
    pub working_hours_start: String,
    #[serde(default = "default_working_hours_end")]
    pub working_hours_end: String,
    #[serde(default = "default_max_minutes_per_day")]
    pub max_minutes_per_day: u32,
    #[serde(default)]
    pub skip_weekends: bool,
    #[serde(default)]
    pub allow_task_splitting: bool,
    #[serde(default)]
    pub existing_items: Vec<ExistingItem>,
}

impl SchedulingConfig {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            working_hours_start: default_working_hours_start(),
            working_hours_end: default_working_hours_end(),
            max_minutes_per_day: default_max_minutes_per_day(),
            skip_weekends: false,
            allow_task_splitting: false,
            existing_items: Vec::new(),
        }
    }

    /// Working window as minutes from midnight, `(start, end)`.
    pub fn working_window(&self) -> AppResult<(u32, u32)> {
        let start = schedule_utils::parse_time(&self.working_hours_start)?;
        let end = schedule_utils::parse_time(&self.working_hours_end)?;
        let start = schedule_utils::minutes_from_midnight(start);
        let end = schedule_utils::minutes_from_midnight(end);
        if start >= end {
            return Err(AppError::validation_with_details(
                "working hours must start before they end",
                json!({
                    "workingHoursStart": self.working_hours_start,
                    "workingHoursEnd": self.working_hours_end,
                }),
            ));
        }
        Ok((start, end))
    }

    pub fn validate(&self) -> AppResult<()> {
        self.working_window()?;
        if self.max_minutes_per_day == 0 {
            return Err(AppError::validation("maxMinutesPerDay must be positive"));
        }
        for item in &self.existing_items {
            schedule_utils::parse_timestamp(&item.start_time)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SplitInfo {
    pub part: u32,
    pub total_parts: u32,
}

/// Reserved for reporting an occupied slot. Placement only ever uses verified
/// free slots, so blocks produced by the scheduler carry `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    #[serde(default)]
    pub existing_item_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBlock {
    pub task_id: String,
    pub task_index: i64,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u32,
    pub split_info: Option<SplitInfo>,
    pub conflict: Option<ConflictInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub scheduled_blocks: Vec<ScheduledBlock>,
    pub total_days: usize,
    pub warnings: Vec<String>,
    pub unscheduled_tasks: Vec<PlanTask>,
}

impl ScheduleResult {
    pub fn blocks_for_task<'a>(
        &'a self,
        task_id: &'a str,
    ) -> impl Iterator<Item = &'a ScheduledBlock> + 'a {
        self.scheduled_blocks
            .iter()
            .filter(move |block| block.task_id == task_id)
    }

    pub fn scheduled_minutes_for_task(&self, task_id: &str) -> u32 {
        self.blocks_for_task(task_id)
            .map(|block| block.duration_minutes)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub day_name: String,
    pub blocks: Vec<ScheduledBlock>,
    pub total_minutes: u32,
}
