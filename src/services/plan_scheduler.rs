use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, debug_span, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::plan::{PlanTask, ScheduleResult, ScheduledBlock, SchedulingConfig, SplitInfo};
use crate::models::settings::SchedulerOptions;
use crate::services::schedule_utils;
use crate::services::slot_finder::{SlotFinder, TimeSlot};

/// Schedules `tasks` with the default options (365 day attempts per task,
/// splits start only with 30 minutes of capacity left).
pub fn schedule_plan(tasks: &[PlanTask], config: &SchedulingConfig) -> AppResult<ScheduleResult> {
    PlanScheduler::default().schedule(tasks, config)
}

/// Greedy first-fit placement of tasks, in index order, onto a calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanScheduler {
    options: SchedulerOptions,
}

/// Position of the placement sweep. A new value is produced on every move;
/// changing the date always clears the per-day bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cursor {
    date: NaiveDate,
    used_minutes: u32,
    booked: Vec<TimeSlot>,
}

impl Cursor {
    fn starting_at(date: NaiveDate) -> Self {
        Self {
            date,
            used_minutes: 0,
            booked: Vec::new(),
        }
    }

    fn next_day(&self) -> AppResult<Self> {
        Ok(Self::starting_at(schedule_utils::add_days(self.date, 1)?))
    }

    fn skip_weekends(self, skip: bool) -> AppResult<Self> {
        let mut cursor = self;
        while skip && schedule_utils::is_weekend(cursor.date) {
            cursor = cursor.next_day()?;
        }
        Ok(cursor)
    }

    fn advance(&self, skip_weekends: bool) -> AppResult<Self> {
        self.next_day()?.skip_weekends(skip_weekends)
    }

    fn book(mut self, slot: TimeSlot) -> Self {
        self.used_minutes += slot.duration();
        self.booked.push(slot);
        self
    }

    fn remaining_today(&self, max_minutes_per_day: u32) -> u32 {
        max_minutes_per_day.saturating_sub(self.used_minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fragment {
    date: NaiveDate,
    slot: TimeSlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    Whole(Fragment),
    Split(Vec<Fragment>),
    Unscheduled { warning: String },
}

impl PlanScheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self { options }
    }

    pub fn schedule(
        &self,
        tasks: &[PlanTask],
        config: &SchedulingConfig,
    ) -> AppResult<ScheduleResult> {
        self.options.validate()?;
        config.validate()?;
        ensure_valid_tasks(tasks)?;

        let span = debug_span!(
            target: "app::scheduler",
            "schedule_plan",
            tasks = tasks.len(),
            start_date = %config.start_date,
        );
        let _guard = span.enter();

        let finder = SlotFinder::new(config)?;
        debug!(
            target: "app::scheduler",
            window_minutes = finder.window_minutes(),
            max_minutes_per_day = finder.max_minutes_per_day(),
            busy_days = finder.busy().busy_day_count(),
            "calendar indexed"
        );

        let mut ordered: Vec<&PlanTask> = tasks.iter().collect();
        ordered.sort_by_key(|task| task.index);

        let start = Cursor::starting_at(config.start_date).skip_weekends(config.skip_weekends)?;
        let (_, mut result) = ordered.into_iter().try_fold(
            (start, ScheduleResult::default()),
            |(cursor, mut result), task| -> AppResult<_> {
                let (placement, next) = self.place_task(task, &cursor, &finder, config)?;
                record_placement(task, placement, &mut result)?;
                Ok((next, result))
            },
        )?;

        result.total_days = result
            .scheduled_blocks
            .iter()
            .map(|block| block.date)
            .collect::<BTreeSet<_>>()
            .len();

        info!(
            target: "app::scheduler",
            blocks = result.scheduled_blocks.len(),
            total_days = result.total_days,
            unscheduled = result.unscheduled_tasks.len(),
            "plan scheduled"
        );

        Ok(result)
    }

    fn place_task(
        &self,
        task: &PlanTask,
        cursor: &Cursor,
        finder: &SlotFinder,
        config: &SchedulingConfig,
    ) -> AppResult<(Placement, Cursor)> {
        let duration = task.user_defined_duration_minutes;
        let window = finder.window_minutes();
        let cap = finder.max_minutes_per_day();
        let single_day_limit = window.min(cap);

        if !config.allow_task_splitting && duration > single_day_limit {
            let warning = format!(
                "Task \"{}\" needs {} minutes but a single day offers at most {} minutes and splitting is disabled",
                task.title, duration, single_day_limit
            );
            return Ok((Placement::Unscheduled { warning }, cursor.clone()));
        }

        let min_split = self.options.min_split_minutes;
        let mut day = cursor.clone();
        let mut fragments: Vec<Fragment> = Vec::new();
        let mut remaining = duration;
        let mut attempts = 0;

        while attempts < self.options.max_attempts {
            let remaining_today = day.remaining_today(cap);

            if fragments.is_empty() {
                if duration <= remaining_today && duration <= window {
                    if let Some(slot) =
                        finder.find_slot_avoiding(day.date, duration, day.used_minutes, &day.booked)
                    {
                        let fragment = Fragment {
                            date: day.date,
                            slot,
                        };
                        return Ok((Placement::Whole(fragment), day.book(slot)));
                    }
                } else if config.allow_task_splitting && remaining_today >= min_split {
                    // First part takes whatever is left of today, in one slot.
                    let size = remaining_today.min(window);
                    if let Some(slot) =
                        finder.find_slot_avoiding(day.date, size, day.used_minutes, &day.booked)
                    {
                        fragments.push(Fragment {
                            date: day.date,
                            slot,
                        });
                        remaining -= size;
                        day = day.book(slot);
                    }
                }
            } else {
                // One day-sized part per eligible day.
                let size = remaining.min(remaining_today).min(window);
                if let Some(slot) =
                    finder.find_slot_avoiding(day.date, size, day.used_minutes, &day.booked)
                {
                    fragments.push(Fragment {
                        date: day.date,
                        slot,
                    });
                    remaining -= size;
                    day = day.book(slot);
                    if remaining == 0 {
                        return Ok((Placement::Split(fragments), day));
                    }
                }
            }

            day = day.advance(config.skip_weekends)?;
            attempts += 1;
        }

        let warning = format!(
            "Could not schedule task \"{}\" ({} minutes) within {} days",
            task.title, duration, self.options.max_attempts
        );
        Ok((Placement::Unscheduled { warning }, cursor.clone()))
    }
}

fn ensure_valid_tasks(tasks: &[PlanTask]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for task in tasks {
        task.validate()?;
        if !seen.insert(task.id.as_str()) {
            return Err(AppError::validation_with_details(
                "duplicate task id",
                json!({"taskId": task.id}),
            ));
        }
    }
    Ok(())
}

fn record_placement(
    task: &PlanTask,
    placement: Placement,
    result: &mut ScheduleResult,
) -> AppResult<()> {
    match placement {
        Placement::Whole(fragment) => {
            debug!(
                target: "app::scheduler",
                task_id = %task.id,
                date = %fragment.date,
                start = fragment.slot.start,
                end = fragment.slot.end,
                "task placed"
            );
            result
                .scheduled_blocks
                .push(build_block(task, &fragment, task.title.clone(), None)?);
        }
        Placement::Split(fragments) => {
            let total_parts = fragments.len() as u32;
            let days = fragments
                .iter()
                .map(|fragment| fragment.date)
                .collect::<BTreeSet<_>>()
                .len();
            debug!(
                target: "app::scheduler",
                task_id = %task.id,
                parts = total_parts,
                days,
                "task split"
            );
            for (idx, fragment) in fragments.iter().enumerate() {
                let part = idx as u32 + 1;
                let title = format!("{} (Part {})", task.title, part);
                let split = SplitInfo { part, total_parts };
                result
                    .scheduled_blocks
                    .push(build_block(task, fragment, title, Some(split))?);
            }
            result.warnings.push(format!(
                "Task \"{}\" was split into {} parts across {} days",
                task.title, total_parts, days
            ));
        }
        Placement::Unscheduled { warning } => {
            warn!(target: "app::scheduler", task_id = %task.id, %warning, "task unscheduled");
            result.warnings.push(warning);
            result.unscheduled_tasks.push(task.clone());
        }
    }
    Ok(())
}

fn build_block(
    task: &PlanTask,
    fragment: &Fragment,
    title: String,
    split_info: Option<SplitInfo>,
) -> AppResult<ScheduledBlock> {
    let start_time = fragment.slot.start_time()?;
    let duration_minutes = fragment.slot.duration();
    let end_time = schedule_utils::add_minutes(&start_time, i64::from(duration_minutes))?;
    Ok(ScheduledBlock {
        task_id: task.id.clone(),
        task_index: task.index,
        title,
        date: fragment.date,
        start_time,
        end_time,
        duration_minutes,
        split_info,
        conflict: None,
    })
}
