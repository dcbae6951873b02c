pub mod plan_scheduler;
pub mod plan_service;
pub mod schedule_output;
pub mod schedule_utils;
pub mod slot_finder;
