//! Block: the atomic half-day scheduling slot.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Half of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeOfDay {
    Am,
    Pm,
}

/// A half-day scheduling slot on a specific date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub date: NaiveDate,
    pub time_of_day: TimeOfDay,
    pub is_holiday: bool,
}

impl Block {
    pub fn new(date: NaiveDate, time_of_day: TimeOfDay, is_holiday: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            time_of_day,
            is_holiday,
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Generate both blocks (AM, PM) for every date in `[start, end]` inclusive,
    /// sorted by date then AM < PM, matching the Scheduling Context contract.
    pub fn generate_range(
        start: NaiveDate,
        end: NaiveDate,
        holidays: &[NaiveDate],
    ) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut day = start;
        while day <= end {
            let is_holiday = holidays.contains(&day);
            blocks.push(Block::new(day, TimeOfDay::Am, is_holiday));
            blocks.push(Block::new(day, TimeOfDay::Pm, is_holiday));
            day = day.succ_opt().expect("date range within representable bounds");
        }
        blocks
    }
}

/// Sort blocks chronologically, AM before PM on the same date. Stable,
/// suitable for the Scheduling Context's ordering contract.
pub fn sort_blocks(blocks: &mut [Block]) {
    blocks.sort_by(|a, b| (a.date, a.time_of_day).cmp(&(b.date, b.time_of_day)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_range_orders_am_before_pm() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let blocks = Block::generate_range(start, end, &[]);
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].time_of_day, TimeOfDay::Am);
        assert_eq!(blocks[1].time_of_day, TimeOfDay::Pm);
        assert_eq!(blocks[0].date, start);
        assert_eq!(blocks[2].date, end);
    }

    #[test]
    fn weekend_detection() {
        // 2026-01-05 is a Monday; 2026-01-10 is a Saturday.
        let mon = Block::new(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(), TimeOfDay::Am, false);
        let sat = Block::new(NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(), TimeOfDay::Am, false);
        assert!(!mon.is_weekend());
        assert!(sat.is_weekend());
    }
}
