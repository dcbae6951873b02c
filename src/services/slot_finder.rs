use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::plan::{ExistingItem, SchedulingConfig};
use crate::services::schedule_utils;

/// Half-open `[start, end)` interval in minutes from midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSlot {
    pub start: u32,
    pub end: u32,
}

impl TimeSlot {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn start_time(&self) -> AppResult<String> {
        schedule_utils::format_minutes(self.start)
    }
}

/// Existing busy intervals bucketed by the calendar day of their timestamp.
#[derive(Debug, Clone, Default)]
pub struct BusyCalendar {
    days: BTreeMap<NaiveDate, Vec<TimeSlot>>,
}

impl BusyCalendar {
    pub fn from_items(items: &[ExistingItem]) -> AppResult<Self> {
        let mut days: BTreeMap<NaiveDate, Vec<TimeSlot>> = BTreeMap::new();
        for item in items {
            if item.duration_minutes == 0 {
                continue;
            }
            let start = schedule_utils::parse_timestamp(&item.start_time)?;
            let start_minute = schedule_utils::minutes_from_midnight(start.time());
            // Anything past midnight is clipped; the item only counts on its own day.
            let end_minute = start_minute
                .saturating_add(item.duration_minutes)
                .min(schedule_utils::MINUTES_PER_DAY);
            days.entry(start.date())
                .or_default()
                .push(TimeSlot::new(start_minute, end_minute));
        }

        for slots in days.values_mut() {
            slots.sort();
        }

        Ok(Self { days })
    }

    pub fn busy_on(&self, date: NaiveDate) -> &[TimeSlot] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn busy_day_count(&self) -> usize {
        self.days.len()
    }
}

/// Feasibility primitive for a single day. Holds only read-only state, so any
/// lookup can be repeated for as many candidate days as needed.
#[derive(Debug, Clone)]
pub struct SlotFinder {
    work_start: u32,
    work_end: u32,
    max_minutes_per_day: u32,
    busy: BusyCalendar,
}

impl SlotFinder {
    pub fn new(config: &SchedulingConfig) -> AppResult<Self> {
        let (work_start, work_end) = config.working_window()?;
        Ok(Self {
            work_start,
            work_end,
            max_minutes_per_day: config.max_minutes_per_day,
            busy: BusyCalendar::from_items(&config.existing_items)?,
        })
    }

    pub fn window_minutes(&self) -> u32 {
        self.work_end - self.work_start
    }

    pub fn max_minutes_per_day(&self) -> u32 {
        self.max_minutes_per_day
    }

    pub fn busy(&self) -> &BusyCalendar {
        &self.busy
    }

    /// Earliest slot of exactly `duration` minutes on `date`, avoiding existing items.
    pub fn find_available_slot(
        &self,
        date: NaiveDate,
        duration: u32,
        used_minutes_today: u32,
    ) -> Option<TimeSlot> {
        self.find_slot_avoiding(date, duration, used_minutes_today, &[])
    }

    /// Same as [`find_available_slot`](Self::find_available_slot) but also
    /// treats `booked` as busy.
    pub fn find_slot_avoiding(
        &self,
        date: NaiveDate,
        duration: u32,
        used_minutes_today: u32,
        booked: &[TimeSlot],
    ) -> Option<TimeSlot> {
        if duration == 0 || duration > self.window_minutes() {
            return None;
        }
        if used_minutes_today.saturating_add(duration) > self.max_minutes_per_day {
            return None;
        }

        self.free_gaps(date, booked)
            .into_iter()
            .find(|gap| gap.duration() >= duration)
            .map(|gap| TimeSlot::new(gap.start, gap.start + duration))
    }

    /// Free gaps inside the working window, in ascending order.
    fn free_gaps(&self, date: NaiveDate, booked: &[TimeSlot]) -> Vec<TimeSlot> {
        let mut busy: Vec<TimeSlot> = self
            .busy
            .busy_on(date)
            .iter()
            .chain(booked.iter())
            .filter(|slot| {
                schedule_utils::overlaps(slot.start, slot.end, self.work_start, self.work_end)
            })
            .copied()
            .collect();
        busy.sort();

        let mut gaps = Vec::new();
        let mut cursor = self.work_start;
        for block in busy {
            if cursor >= self.work_end {
                break;
            }
            let gap_end = block.start.min(self.work_end);
            if gap_end > cursor {
                gaps.push(TimeSlot::new(cursor, gap_end));
            }
            cursor = cursor.max(block.end);
        }

        if cursor < self.work_end {
            gaps.push(TimeSlot::new(cursor, self.work_end));
        }

        gaps
    }
}
