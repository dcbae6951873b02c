use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use clap::Parser;
use plan_scheduler_lib::models::plan::{DaySchedule, PlanTask, ScheduleResult, SchedulingConfig};
use plan_scheduler_lib::models::settings::SchedulerOptions;
use plan_scheduler_lib::models::timeline::TimelineItemCreate;
use plan_scheduler_lib::services::plan_scheduler::PlanScheduler;
use plan_scheduler_lib::services::schedule_output;
use plan_scheduler_lib::utils::logger;
use plan_scheduler_lib::AppResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest {
    tasks: Vec<PlanTask>,
    config: SchedulingConfig,
    #[serde(default)]
    options: Option<SchedulerOptions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleResponse {
    result: ScheduleResult,
    days: Vec<DaySchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeline_items: Option<Vec<TimelineItemCreate>>,
}

/// Places plan tasks onto a calendar and prints the schedule as JSON
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArgs {
    /// Request file with `tasks` and `config` (JSON, or YAML for any other extension)
    request: PathBuf,

    /// IANA time zone used for timeline items
    #[arg(long, default_value = "UTC", value_parser = parse_tz)]
    tz: Tz,

    /// Also emit timeline items tagged with this plan id
    #[arg(long)]
    plan_id: Option<String>,

    /// Scheduler options file (overrides `options` in the request)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Directory for daily rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("plan-scheduler failed: {error}");
        if let Some(details) = error.validation_details() {
            eprintln!("{details}");
        }
        std::process::exit(1);
    }
}

fn run() -> AppResult<()> {
    let args = CliArgs::parse();
    logger::init_logging(args.log_dir.as_deref())?;

    let request = read_request(&args.request)?;
    let options = match (&args.options, request.options) {
        (Some(path), _) => SchedulerOptions::from_path(path)?,
        (None, Some(options)) => options,
        (None, None) => SchedulerOptions::default(),
    };
    debug!(target: "app::cli", ?options, tasks = request.tasks.len(), "request loaded");

    let result = PlanScheduler::new(options).schedule(&request.tasks, &request.config)?;
    let days = schedule_output::group_by_day(&result.scheduled_blocks);

    let timeline_items = match &args.plan_id {
        Some(plan_id) => Some(schedule_output::to_timeline_items(
            &result.scheduled_blocks,
            plan_id,
            &request.tasks,
            args.tz,
        )?),
        None => None,
    };

    let response = ScheduleResponse {
        result,
        days,
        timeline_items,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn read_request(path: &Path) -> AppResult<ScheduleRequest> {
    let raw = std::fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&raw)?),
        _ => Ok(serde_yaml::from_str(&raw)?),
    }
}

fn parse_tz(name: &str) -> Result<Tz, String> {
    name.parse::<Tz>()
        .map_err(|err| format!("unknown timezone {name}: {err}"))
}
