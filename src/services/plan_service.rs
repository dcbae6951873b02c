use chrono_tz::Tz;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::repositories::timeline_repository::{TimelineItemRow, TimelineRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::plan::{PlanTask, ScheduleResult, SchedulingConfig};
use crate::models::settings::SchedulerOptions;
use crate::models::timeline::TimelineItemRecord;
use crate::services::plan_scheduler::PlanScheduler;
use crate::services::schedule_output;
use crate::services::schedule_utils;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPlan {
    pub plan_id: String,
    pub result: ScheduleResult,
    pub items: Vec<TimelineItemRecord>,
}

/// Runs the scheduler against the calendar stored in SQLite and writes the
/// outcome back as timeline items.
#[derive(Clone)]
pub struct PlanService {
    db: DbPool,
    scheduler: PlanScheduler,
}

impl PlanService {
    pub fn new(db: DbPool, options: SchedulerOptions) -> Self {
        Self {
            db,
            scheduler: PlanScheduler::new(options),
        }
    }

    /// Schedules without persisting anything.
    pub fn preview(
        &self,
        tasks: &[PlanTask],
        config: &SchedulingConfig,
    ) -> AppResult<ScheduleResult> {
        let merged = self
            .db
            .with_connection(|conn| config_with_stored_items(conn, config, None))?;
        self.scheduler.schedule(tasks, &merged)
    }

    /// Schedules and stores the blocks under `plan_id`. Items from an earlier
    /// apply of the same plan are replaced rather than treated as busy time.
    pub fn apply(
        &self,
        plan_id: &str,
        tasks: &[PlanTask],
        config: &SchedulingConfig,
        tz: Tz,
    ) -> AppResult<AppliedPlan> {
        if plan_id.trim().is_empty() {
            return Err(AppError::validation("plan id must not be empty"));
        }

        // Reading the calendar and writing the plan share one transaction so
        // two applies cannot claim the same free slot.
        let (result, rows, replaced) = self.db.with_transaction(|tx| {
            let merged = config_with_stored_items(tx, config, Some(plan_id))?;
            let result = self.scheduler.schedule(tasks, &merged)?;

            let creates =
                schedule_output::to_timeline_items(&result.scheduled_blocks, plan_id, tasks, tz)?;
            let rows = creates
                .iter()
                .map(TimelineItemRow::from_create)
                .collect::<AppResult<Vec<_>>>()?;

            let replaced = TimelineRepository::replace_plan(tx, plan_id, &rows)?;
            Ok((result, rows, replaced))
        })?;

        info!(
            target: "app::planning",
            plan_id,
            inserted = rows.len(),
            replaced,
            unscheduled = result.unscheduled_tasks.len(),
            "plan applied"
        );

        Ok(AppliedPlan {
            plan_id: plan_id.to_string(),
            result,
            items: rows.into_iter().map(TimelineItemRow::into_record).collect(),
        })
    }

    pub fn plan_items(&self, plan_id: &str) -> AppResult<Vec<TimelineItemRecord>> {
        self.db.with_connection(|conn| {
            let rows = TimelineRepository::list_by_plan(conn, plan_id)?;
            Ok(rows.into_iter().map(TimelineItemRow::into_record).collect())
        })
    }
}

fn config_with_stored_items(
    conn: &Connection,
    config: &SchedulingConfig,
    exclude_plan: Option<&str>,
) -> AppResult<SchedulingConfig> {
    let from_day = schedule_utils::format_date(config.start_date);
    let stored = TimelineRepository::list_from_day(conn, &from_day)?;

    let mut merged = config.clone();
    merged.existing_items.extend(
        stored
            .into_iter()
            .filter(|row| exclude_plan.is_none() || row.plan_id.as_deref() != exclude_plan)
            .map(|row| row.into_record().to_existing_item()),
    );

    debug!(
        target: "app::planning",
        from_day = %from_day,
        supplied = config.existing_items.len(),
        total = merged.existing_items.len(),
        "existing items loaded"
    );

    Ok(merged)
}
