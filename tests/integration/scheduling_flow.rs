use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use plan_scheduler_lib::models::plan::{
    ExistingItem, PlanTask, ScheduleResult, SchedulingConfig, SplitInfo,
};
use plan_scheduler_lib::services::schedule_utils;
use plan_scheduler_lib::{group_by_day, schedule_plan, AppResult, PlanScheduler, SchedulerOptions};

// 2025-05-01 is a Thursday.
fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date")
}

fn day(offset: i64) -> NaiveDate {
    schedule_utils::add_days(start_date(), offset).expect("valid offset")
}

fn task(id: &str, index: i64, minutes: u32) -> PlanTask {
    PlanTask {
        id: id.to_string(),
        index,
        title: format!("Task {id}"),
        user_defined_duration_minutes: minutes,
        is_flexible: false,
        color: None,
    }
}

fn busy(start_time: &str, duration_minutes: u32) -> ExistingItem {
    ExistingItem {
        id: Some(format!("busy-{start_time}")),
        title: Some("Meeting".to_string()),
        start_time: start_time.to_string(),
        duration_minutes,
    }
}

fn minutes(time: &str) -> u32 {
    schedule_utils::minutes_from_midnight(schedule_utils::parse_time(time).expect("valid time"))
}

/// Checks every structural property a schedule must satisfy.
fn assert_schedule_invariants(tasks: &[PlanTask], config: &SchedulingConfig, result: &ScheduleResult) {
    let unscheduled: HashSet<_> = result.unscheduled_tasks.iter().map(|t| t.id.as_str()).collect();

    for task in tasks {
        let placed = result.scheduled_minutes_for_task(&task.id);
        if unscheduled.contains(task.id.as_str()) {
            assert_eq!(placed, 0, "unscheduled task {} has blocks", task.id);
        } else {
            assert_eq!(
                placed, task.user_defined_duration_minutes,
                "duration of task {} not conserved",
                task.id
            );
        }
    }

    let work_start = minutes(&config.working_hours_start);
    let work_end = minutes(&config.working_hours_end);
    let mut per_day: BTreeMap<NaiveDate, Vec<(u32, u32)>> = BTreeMap::new();

    for block in &result.scheduled_blocks {
        let start = minutes(&block.start_time);
        let end = minutes(&block.end_time);
        assert_eq!(end - start, block.duration_minutes);
        assert!(start >= work_start && end <= work_end, "block outside working hours");
        assert!(block.conflict.is_none());

        if config.skip_weekends {
            assert!(!matches!(block.date.weekday(), Weekday::Sat | Weekday::Sun));
        }

        for item in &config.existing_items {
            let item_start = schedule_utils::parse_timestamp(&item.start_time).expect("timestamp");
            if item_start.date() != block.date {
                continue;
            }
            let busy_start = schedule_utils::minutes_from_midnight(item_start.time());
            let busy_end = busy_start + item.duration_minutes;
            assert!(
                !schedule_utils::overlaps(start, end, busy_start, busy_end),
                "block {} overlaps existing item",
                block.title
            );
        }

        per_day.entry(block.date).or_default().push((start, end));
    }

    for (date, mut intervals) in per_day {
        let total: u32 = intervals.iter().map(|(s, e)| e - s).sum();
        assert!(total <= config.max_minutes_per_day, "daily cap exceeded on {date}");
        intervals.sort();
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "scheduled blocks overlap on {date}");
        }
    }

    let distinct: HashSet<_> = result.scheduled_blocks.iter().map(|b| b.date).collect();
    assert_eq!(result.total_days, distinct.len());
}

#[test]
fn simple_fit_lands_at_start_of_working_hours() -> AppResult<()> {
    let tasks = vec![task("a", 1, 60)];
    let config = SchedulingConfig::new(start_date());
    let result = schedule_plan(&tasks, &config)?;

    assert_eq!(result.scheduled_blocks.len(), 1);
    let block = &result.scheduled_blocks[0];
    assert_eq!(block.date, start_date());
    assert_eq!(block.start_time, "09:00");
    assert_eq!(block.end_time, "10:00");
    assert!(block.split_info.is_none());
    assert!(result.warnings.is_empty());
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn conflict_avoidance_starts_after_existing_item() -> AppResult<()> {
    let tasks = vec![task("a", 1, 60)];
    let mut config = SchedulingConfig::new(start_date());
    config.existing_items = vec![busy("2025-05-01T09:00:00", 60)];
    let result = schedule_plan(&tasks, &config)?;

    assert_eq!(result.scheduled_blocks[0].start_time, "10:00");
    assert_eq!(result.scheduled_blocks[0].date, start_date());
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn database_style_existing_timestamps_are_accepted() -> AppResult<()> {
    let tasks = vec![task("a", 1, 60)];
    let mut config = SchedulingConfig::new(start_date());
    config.existing_items = vec![busy("2025-05-01 09:00:00+00", 60)];
    let result = schedule_plan(&tasks, &config)?;

    assert_eq!(result.scheduled_blocks[0].start_time, "10:00");
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn splitting_spreads_task_over_two_days() -> AppResult<()> {
    let tasks = vec![task("a", 1, 500)];
    let mut config = SchedulingConfig::new(start_date());
    config.allow_task_splitting = true;
    let result = schedule_plan(&tasks, &config)?;

    let blocks = &result.scheduled_blocks;
    assert_eq!(blocks.len(), 2);

    assert_eq!(blocks[0].date, day(0));
    assert_eq!((blocks[0].start_time.as_str(), blocks[0].end_time.as_str()), ("09:00", "17:00"));
    assert_eq!(blocks[0].duration_minutes, 480);
    assert_eq!(blocks[0].title, "Task a (Part 1)");
    assert_eq!(blocks[0].split_info, Some(SplitInfo { part: 1, total_parts: 2 }));

    assert_eq!(blocks[1].date, day(1));
    assert_eq!((blocks[1].start_time.as_str(), blocks[1].end_time.as_str()), ("09:00", "09:20"));
    assert_eq!(blocks[1].duration_minutes, 20);
    assert_eq!(blocks[1].split_info, Some(SplitInfo { part: 2, total_parts: 2 }));

    assert_eq!(result.total_days, 2);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.unscheduled_tasks.is_empty());
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn oversized_task_without_splitting_is_unscheduled() -> AppResult<()> {
    let tasks = vec![task("a", 1, 600)];
    let config = SchedulingConfig::new(start_date());
    let result = schedule_plan(&tasks, &config)?;

    assert!(result.scheduled_blocks.is_empty());
    assert_eq!(result.unscheduled_tasks, tasks);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.total_days, 0);
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn full_day_tasks_keep_their_order() -> AppResult<()> {
    let tasks = vec![task("b", 2, 480), task("a", 1, 480)];
    let config = SchedulingConfig::new(start_date());
    let result = schedule_plan(&tasks, &config)?;

    let a: Vec<_> = result.blocks_for_task("a").collect();
    let b: Vec<_> = result.blocks_for_task("b").collect();
    assert_eq!(a[0].date, day(0));
    assert_eq!(b[0].date, day(1));
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn weekends_are_never_used_when_skipped() -> AppResult<()> {
    let tasks: Vec<_> = (1..=4).map(|i| task(&format!("t{i}"), i, 480)).collect();
    let mut config = SchedulingConfig::new(start_date());
    config.skip_weekends = true;
    let result = schedule_plan(&tasks, &config)?;

    let dates: Vec<_> = result.scheduled_blocks.iter().map(|b| b.date).collect();
    // Thu, Fri, then Mon and Tue.
    assert_eq!(dates, vec![day(0), day(1), day(4), day(5)]);
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn split_continuation_skips_weekend() -> AppResult<()> {
    let tasks = vec![task("a", 1, 60), task("b", 2, 1000)];
    let mut config = SchedulingConfig::new(day(1));
    config.skip_weekends = true;
    config.allow_task_splitting = true;
    let result = schedule_plan(&tasks, &config)?;

    let b: Vec<_> = result.blocks_for_task("b").collect();
    assert_eq!(b.len(), 3);
    assert_eq!((b[0].date, b[0].start_time.as_str(), b[0].duration_minutes), (day(1), "10:00", 420));
    assert_eq!((b[1].date, b[1].duration_minutes), (day(4), 480));
    assert_eq!((b[2].date, b[2].duration_minutes), (day(5), 100));
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn split_parts_are_clamped_to_the_working_window() -> AppResult<()> {
    let tasks = vec![task("a", 1, 900), task("b", 2, 550)];
    let mut config = SchedulingConfig::new(start_date());
    config.max_minutes_per_day = 600;
    config.allow_task_splitting = true;
    let result = schedule_plan(&tasks, &config)?;

    let a: Vec<_> = result
        .blocks_for_task("a")
        .map(|b| (b.date, b.start_time.as_str(), b.end_time.as_str()))
        .collect();
    assert_eq!(
        a,
        vec![(day(0), "09:00", "17:00"), (day(1), "09:00", "16:00")]
    );

    // Fits the daily cap but not the window, so it is split as well.
    let b: Vec<_> = result
        .blocks_for_task("b")
        .map(|b| (b.date, b.duration_minutes))
        .collect();
    assert_eq!(b, vec![(day(2), 480), (day(3), 70)]);

    assert!(result.unscheduled_tasks.is_empty());
    assert_schedule_invariants(&tasks, &config, &result);
    Ok(())
}

#[test]
fn exhausted_task_leaves_later_tasks_where_they_would_be() -> AppResult<()> {
    let mut config = SchedulingConfig::new(start_date());
    config.skip_weekends = true;
    config.allow_task_splitting = true;
    let scheduler = PlanScheduler::new(SchedulerOptions {
        max_attempts: 4,
        ..Default::default()
    });

    let later = vec![task("c", 3, 480), task("d", 4, 480), task("e", 5, 200)];
    let mut with_failure = vec![task("huge", 1, 480 * 6)];
    with_failure.extend(later.iter().cloned());

    let baseline = scheduler.schedule(&later, &config)?;
    let result = scheduler.schedule(&with_failure, &config)?;

    assert_eq!(result.unscheduled_tasks.len(), 1);
    assert_eq!(result.unscheduled_tasks[0].id, "huge");
    assert_eq!(result.blocks_for_task("huge").count(), 0);
    assert_eq!(result.scheduled_blocks, baseline.scheduled_blocks);

    let dates: Vec<_> = result.scheduled_blocks.iter().map(|b| b.date).collect();
    assert_eq!(dates, vec![day(0), day(1), day(4)]);
    assert_schedule_invariants(&with_failure, &config, &result);
    Ok(())
}

#[test]
fn busy_calendar_mixed_workload_respects_all_properties() -> AppResult<()> {
    let tasks = vec![
        task("review", 3, 45),
        task("design", 1, 240),
        task("migration", 2, 700),
        task("retro", 4, 30),
        task("impossible", 5, 2000),
    ];
    let mut config = SchedulingConfig::new(start_date());
    config.working_hours_start = "08:30".into();
    config.working_hours_end = "17:30".into();
    config.max_minutes_per_day = 420;
    config.allow_task_splitting = true;
    config.skip_weekends = true;
    config.existing_items = vec![
        busy("2025-05-01T10:00:00", 60),
        busy("2025-05-01T13:00:00", 30),
        busy("2025-05-02T08:30:00+02:00", 90),
        busy("2025-05-05T12:00:00", 120),
        busy("2025-05-03T09:00:00", 600),
    ];

    let result = schedule_plan(&tasks, &config)?;
    assert_schedule_invariants(&tasks, &config, &result);
    assert!(result.unscheduled_tasks.is_empty());

    let design: Vec<_> = result.blocks_for_task("design").collect();
    assert_eq!(design.len(), 1);
    assert_eq!(design[0].date, day(0));
    assert_eq!(design[0].start_time, "13:30");

    assert!(result
        .blocks_for_task("migration")
        .all(|block| block.split_info.is_some()));
    Ok(())
}

#[test]
fn day_grouping_summarises_result() -> AppResult<()> {
    let tasks = vec![task("a", 1, 300), task("b", 2, 120), task("c", 3, 200)];
    let mut config = SchedulingConfig::new(start_date());
    config.max_minutes_per_day = 420;
    let result = schedule_plan(&tasks, &config)?;

    let days = group_by_day(&result.scheduled_blocks);
    assert_eq!(days, group_by_day(&result.scheduled_blocks));
    assert_eq!(days.len(), result.total_days);
    assert_eq!(days[0].total_minutes, 420);
    assert_eq!(days[0].day_name, "Thursday");
    assert_eq!(days[1].total_minutes, 200);
    for pair in days.windows(2) {
        assert!(pair[0].date < pair[1].date);
    }
    Ok(())
}
