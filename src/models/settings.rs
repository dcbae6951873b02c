use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 365;
pub const DEFAULT_MIN_SPLIT_MINUTES: u32 = 30;

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_min_split_minutes() -> u32 {
    DEFAULT_MIN_SPLIT_MINUTES
}

/// Deployment-level tuning for the scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerOptions {
    /// Day-advances a single task may consume before it is reported as unscheduled.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Capacity a day must have left before a split may start on it.
    #[serde(default = "default_min_split_minutes")]
    pub min_split_minutes: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_split_minutes: DEFAULT_MIN_SPLIT_MINUTES,
        }
    }
}

impl SchedulerOptions {
    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        let options: SchedulerOptions = serde_yaml::from_str(raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        let options: SchedulerOptions = serde_json::from_str(raw)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a `.json` file, or YAML for any other extension.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_yaml_str(&raw),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_attempts == 0 {
            return Err(AppError::validation("maxAttempts must be positive"));
        }
        if self.min_split_minutes == 0 {
            return Err(AppError::validation_with_details(
                "minSplitMinutes must be positive",
                json!({"minSplitMinutes": self.min_split_minutes}),
            ));
        }
        Ok(())
    }
}
