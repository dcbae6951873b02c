use serde::{Deserialize, Serialize};

use crate::models::plan::ExistingItem;

/// Shape of a timeline item ready for insertion into the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineItemCreate {
    pub title: String,
    pub start_time: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_flexible: bool,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub plan_task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineItemRecord {
    pub id: String,
    pub title: String,
    pub start_time: String,
    pub day: String,
    pub duration_minutes: u32,
    pub color: Option<String>,
    pub is_flexible: bool,
    pub plan_id: Option<String>,
    pub plan_task_id: Option<String>,
    pub created_at: String,
}

impl TimelineItemRecord {
    pub fn to_existing_item(&self) -> ExistingItem {
        ExistingItem {
            id: Some(self.id.clone()),
            title: Some(self.title.clone()),
            start_time: self.start_time.clone(),
            duration_minutes: self.duration_minutes,
        }
    }
}
