pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, AppResult};
pub use models::plan::{
    ConflictInfo, DaySchedule, ExistingItem, PlanTask, ScheduleResult, ScheduledBlock,
    SchedulingConfig, SplitInfo,
};
pub use models::settings::SchedulerOptions;
pub use services::plan_scheduler::{schedule_plan, PlanScheduler};
pub use services::schedule_output::{group_by_day, to_timeline_items};
