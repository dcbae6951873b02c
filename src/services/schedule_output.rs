use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::plan::{DaySchedule, PlanTask, ScheduledBlock};
use crate::models::timeline::TimelineItemCreate;
use crate::services::schedule_utils;

/// Buckets blocks per calendar day, earliest day first, blocks ordered by start time.
pub fn group_by_day(blocks: &[ScheduledBlock]) -> Vec<DaySchedule> {
    let mut days: BTreeMap<NaiveDate, Vec<ScheduledBlock>> = BTreeMap::new();
    for block in blocks {
        days.entry(block.date).or_default().push(block.clone());
    }

    days.into_iter()
        .map(|(date, mut blocks)| {
            blocks.sort_by(|a, b| a.start_time.cmp(&b.start_time));
            let total_minutes = blocks.iter().map(|block| block.duration_minutes).sum();
            DaySchedule {
                date,
                day_name: schedule_utils::day_name(date).to_string(),
                blocks,
                total_minutes,
            }
        })
        .collect()
}

/// Maps scheduled blocks to timeline items anchored in `tz`.
pub fn to_timeline_items(
    blocks: &[ScheduledBlock],
    plan_id: &str,
    tasks: &[PlanTask],
    tz: Tz,
) -> AppResult<Vec<TimelineItemCreate>> {
    let tasks_by_id = tasks
        .iter()
        .map(|task| (task.id.as_str(), task))
        .collect::<HashMap<_, _>>();

    blocks
        .iter()
        .map(|block| {
            let task = tasks_by_id.get(block.task_id.as_str()).ok_or_else(|| {
                AppError::validation_with_details(
                    "scheduled block references an unknown task",
                    json!({"taskId": block.task_id}),
                )
            })?;

            let start = schedule_utils::parse_time(&block.start_time)?;
            let local = block.date.and_time(start);
            let start_at = tz.from_local_datetime(&local).earliest().ok_or_else(|| {
                AppError::validation_with_details(
                    "block start does not exist in the target timezone",
                    json!({
                        "date": schedule_utils::format_date(block.date),
                        "startTime": block.start_time,
                        "timezone": tz.name(),
                    }),
                )
            })?;

            Ok(TimelineItemCreate {
                title: block.title.clone(),
                start_time: start_at.to_rfc3339(),
                duration_minutes: block.duration_minutes,
                color: task.color.clone(),
                is_flexible: task.is_flexible,
                plan_id: Some(plan_id.to_string()),
                plan_task_id: Some(task.id.clone()),
            })
        })
        .collect()
}
