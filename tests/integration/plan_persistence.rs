use chrono::NaiveDate;
use chrono_tz::Tz;
use plan_scheduler_lib::db::repositories::timeline_repository::{
    TimelineItemRow, TimelineRepository,
};
use plan_scheduler_lib::db::DbPool;
use plan_scheduler_lib::models::plan::{PlanTask, SchedulingConfig};
use plan_scheduler_lib::models::settings::SchedulerOptions;
use plan_scheduler_lib::models::timeline::TimelineItemCreate;
use plan_scheduler_lib::services::plan_service::PlanService;
use tempfile::tempdir;

fn task(id: &str, index: i64, minutes: u32, color: &str) -> PlanTask {
    PlanTask {
        id: id.into(),
        index,
        title: format!("Goal step {id}"),
        user_defined_duration_minutes: minutes,
        is_flexible: index % 2 == 0,
        color: Some(color.into()),
    }
}

#[test]
fn plan_apply_flow_respects_stored_calendar() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("timeline.sqlite")).expect("db pool");

    // A meeting already on the calendar, stored in Berlin local time.
    pool.with_connection(|conn| {
        let row = TimelineItemRow::from_create(&TimelineItemCreate {
            title: "Weekly sync".into(),
            start_time: "2025-05-01T09:00:00+02:00".into(),
            duration_minutes: 60,
            color: None,
            is_flexible: false,
            plan_id: None,
            plan_task_id: None,
        })?;
        TimelineRepository::insert(conn, &row)
    })
    .expect("seed meeting");

    let service = PlanService::new(pool.clone(), SchedulerOptions::default());
    let mut config =
        SchedulingConfig::new(NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date"));
    config.allow_task_splitting = true;
    config.skip_weekends = true;

    let tasks = vec![
        task("research", 1, 120, "#1f77b4"),
        task("outline", 2, 500, "#ff7f0e"),
    ];

    let preview = service.preview(&tasks, &config).expect("preview");
    assert_eq!(preview.scheduled_blocks[0].start_time, "10:00");
    assert!(service.plan_items("goal-1").expect("items").is_empty());

    let applied = service
        .apply("goal-1", &tasks, &config, chrono_tz::Europe::Berlin)
        .expect("apply plan");
    assert_eq!(applied.result, preview);
    assert_eq!(applied.items.len(), applied.result.scheduled_blocks.len());

    let first = &applied.items[0];
    assert_eq!(first.start_time, "2025-05-01T10:00:00+02:00");
    assert_eq!(first.day, "2025-05-01");
    assert_eq!(first.color.as_deref(), Some("#1f77b4"));
    assert_eq!(first.plan_task_id.as_deref(), Some("research"));

    // 360 minutes are left on Thursday but the meeting leaves no single slot
    // that long, so the outline starts on Friday and finishes on Monday.
    let outline: Vec<_> = applied
        .items
        .iter()
        .filter(|item| item.plan_task_id.as_deref() == Some("outline"))
        .map(|item| (item.start_time.as_str(), item.duration_minutes))
        .collect();
    assert_eq!(
        outline,
        vec![
            ("2025-05-02T09:00:00+02:00", 480),
            ("2025-05-05T09:00:00+02:00", 20),
        ]
    );

    let outline_minutes: u32 = applied
        .items
        .iter()
        .filter(|item| item.plan_task_id.as_deref() == Some("outline"))
        .map(|item| item.duration_minutes)
        .sum();
    assert_eq!(outline_minutes, 500);
    assert!(applied
        .items
        .iter()
        .filter(|item| item.plan_task_id.as_deref() == Some("outline"))
        .all(|item| item.is_flexible));

    let stored = service.plan_items("goal-1").expect("stored items");
    assert_eq!(stored.len(), applied.items.len());

    // A second plan now has to work around everything stored so far.
    let follow_up = service
        .preview(&[task("review", 1, 60, "#2ca02c")], &config)
        .expect("follow-up preview");
    let block = &follow_up.scheduled_blocks[0];
    assert_eq!(block.date, NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date"));
    assert_eq!(block.start_time, "12:00");
}

#[test]
fn apply_in_dst_gap_writes_nothing() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("timeline.sqlite")).expect("db pool");
    let service = PlanService::new(pool, SchedulerOptions::default());

    // 02:30 on 2025-03-30 does not exist in Berlin.
    let mut config =
        SchedulingConfig::new(NaiveDate::from_ymd_opt(2025, 3, 30).expect("valid date"));
    config.working_hours_start = "02:30".into();
    config.working_hours_end = "05:00".into();

    let result = service.apply(
        "night-plan",
        &[task("night", 1, 30, "#000000")],
        &config,
        chrono_tz::Europe::Berlin,
    );
    assert!(result.is_err());
    assert!(service.plan_items("night-plan").expect("items").is_empty());

    let utc = service
        .apply("night-plan", &[task("night", 1, 30, "#000000")], &config, Tz::UTC)
        .expect("apply in utc");
    assert_eq!(utc.items[0].start_time, "2025-03-30T02:30:00+00:00");
}
